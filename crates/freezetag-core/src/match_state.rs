use serde::{Deserialize, Serialize};

/// Outer state of the hosted match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchState {
    /// Waiting for the minimum population.
    #[default]
    Lobby,
    /// Join countdown running; roles are drawn when it expires.
    TeamSelection,
    /// A round is live.
    Gameplay,
    /// Round results on display; the next join countdown is already running.
    Results,
}

impl MatchState {
    /// Whether `self -> target` is a legal edge of the match cycle.
    ///
    /// `TeamSelection -> Lobby` is the aborted-start edge taken when the
    /// population drops below the minimum before roles are drawn.
    pub fn can_transition_to(self, target: MatchState) -> bool {
        use MatchState::*;
        matches!(
            (self, target),
            (Lobby, TeamSelection)
                | (TeamSelection, Gameplay)
                | (TeamSelection, Lobby)
                | (Gameplay, Results)
                | (Results, TeamSelection)
                | (Results, Lobby)
        )
    }
}

impl std::fmt::Display for MatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MatchState::Lobby => "lobby",
            MatchState::TeamSelection => "team_selection",
            MatchState::Gameplay => "gameplay",
            MatchState::Results => "results",
        };
        f.write_str(name)
    }
}
