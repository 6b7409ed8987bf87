use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use freezetag_core::player::{PlayerId, Role};

/// Error returned when roles cannot be drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignError {
    InsufficientPlayers { required: usize, available: usize },
}

impl std::fmt::Display for AssignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientPlayers {
                required,
                available,
            } => write!(
                f,
                "insufficient players: {available} eligible, {required} required"
            ),
        }
    }
}

impl std::error::Error for AssignError {}

/// Outcome of a successful draw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamSplit {
    pub seekers: Vec<PlayerId>,
    pub runners: Vec<PlayerId>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    role: Role,
    rotation_weight: u32,
}

/// Owns each player's role and rotation weight.
///
/// Seekers are drawn by weighted sampling without replacement, where a
/// player's weight is `rotation_weight + 1`. Drawn players drop to weight 0
/// and everyone else in the pool gains 1, so players who have waited longer
/// are more likely to seek next.
#[derive(Debug)]
pub struct TeamAssigner {
    players: BTreeMap<PlayerId, Entry>,
    seeker_count: usize,
    min_players: usize,
    rng: StdRng,
}

impl TeamAssigner {
    pub fn new(seeker_count: usize, min_players: usize) -> Self {
        Self::with_rng(seeker_count, min_players, StdRng::from_os_rng())
    }

    /// Deterministic draws for tests and replays.
    pub fn with_seed(seeker_count: usize, min_players: usize, seed: u64) -> Self {
        Self::with_rng(seeker_count, min_players, StdRng::seed_from_u64(seed))
    }

    fn with_rng(seeker_count: usize, min_players: usize, rng: StdRng) -> Self {
        Self {
            players: BTreeMap::new(),
            seeker_count,
            min_players,
            rng,
        }
    }

    /// Register a player. Their weight starts at the current mean, rounded
    /// to nearest, so newcomers neither jump nor lose their place in line.
    pub fn add_player(&mut self, player: PlayerId) {
        if self.players.contains_key(&player) {
            return;
        }
        let rotation_weight = self.mean_weight();
        self.players.insert(
            player,
            Entry {
                role: Role::Spectator,
                rotation_weight,
            },
        );
        tracing::debug!(player_id = player, rotation_weight, "Player registered");
    }

    /// Forget a player. Returns the role they held.
    pub fn remove_player(&mut self, player: PlayerId) -> Option<Role> {
        self.players.remove(&player).map(|e| e.role)
    }

    fn mean_weight(&self) -> u32 {
        if self.players.is_empty() {
            return 0;
        }
        let sum: u64 = self
            .players
            .values()
            .map(|e| u64::from(e.rotation_weight))
            .sum();
        (sum as f64 / self.players.len() as f64).round() as u32
    }

    /// Clear every role back to Spectator.
    pub fn start_selection(&mut self) {
        for entry in self.players.values_mut() {
            entry.role = Role::Spectator;
        }
    }

    /// Draw Seekers from `eligible`; the rest of the pool become Runners.
    /// Registered players outside the pool stay Spectators.
    pub fn finalize(&mut self, eligible: &[PlayerId]) -> Result<TeamSplit, AssignError> {
        let mut seen = BTreeSet::new();
        let pool: Vec<PlayerId> = eligible
            .iter()
            .copied()
            .filter(|p| seen.insert(*p))
            .collect();

        if pool.len() < self.min_players {
            return Err(AssignError::InsufficientPlayers {
                required: self.min_players,
                available: pool.len(),
            });
        }
        for &p in &pool {
            self.add_player(p);
        }

        let k = self.seeker_count.min(pool.len());
        let mut candidates = pool.clone();
        let mut seekers = Vec::with_capacity(k);
        for _ in 0..k {
            let weights: Vec<u64> = candidates
                .iter()
                .map(|p| u64::from(self.rotation_weight(*p).unwrap_or(0)) + 1)
                .collect();
            let total: u64 = weights.iter().sum();
            let mut roll = self.rng.random_range(0..total);
            let mut idx = candidates.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                if roll < *w {
                    idx = i;
                    break;
                }
                roll -= w;
            }
            seekers.push(candidates.remove(idx));
        }

        let mut split = TeamSplit::default();
        for p in pool {
            let Some(entry) = self.players.get_mut(&p) else {
                continue;
            };
            if seekers.contains(&p) {
                entry.role = Role::Seeker;
                entry.rotation_weight = 0;
                split.seekers.push(p);
            } else {
                entry.role = Role::Runner;
                entry.rotation_weight = entry.rotation_weight.saturating_add(1);
                split.runners.push(p);
            }
        }

        tracing::info!(
            seekers = ?split.seekers,
            runners = split.runners.len(),
            "Teams finalized"
        );
        Ok(split)
    }

    /// Set a role directly, bypassing the draw.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn force_role(&mut self, player: PlayerId, role: Role) {
        self.add_player(player);
        if let Some(entry) = self.players.get_mut(&player) {
            entry.role = role;
        }
    }

    pub fn role(&self, player: PlayerId) -> Role {
        self.players
            .get(&player)
            .map(|e| e.role)
            .unwrap_or_default()
    }

    pub fn is_seeker(&self, player: PlayerId) -> bool {
        self.role(player) == Role::Seeker
    }

    pub fn is_runner(&self, player: PlayerId) -> bool {
        self.role(player) == Role::Runner
    }

    pub fn rotation_weight(&self, player: PlayerId) -> Option<u32> {
        self.players.get(&player).map(|e| e.rotation_weight)
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.players.contains_key(&player)
    }

    /// Players holding `role`, in id order.
    pub fn with_role(&self, role: Role) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|(_, e)| e.role == role)
            .map(|(&p, _)| p)
            .collect()
    }

    pub fn seekers(&self) -> Vec<PlayerId> {
        self.with_role(Role::Seeker)
    }

    pub fn runners(&self) -> Vec<PlayerId> {
        self.with_role(Role::Runner)
    }

    /// Seekers and Runners, in id order.
    pub fn participants(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|(_, e)| e.role.is_participant())
            .map(|(&p, _)| p)
            .collect()
    }
}
