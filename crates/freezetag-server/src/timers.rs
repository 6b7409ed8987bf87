//! Cancellable timers for the match actor.
//!
//! Timers never touch game state. A firing is a [`TimerFired`] message that
//! the owner feeds back into the state machine, which first asks the
//! scheduler whether the id is still live. Cancelling a scope therefore
//! also neutralizes firings that were already queued when it happened.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Groups of timers that are cancelled together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerScope {
    Lobby,
    Selection,
    Results,
    /// Phase countdown and round clock.
    Phase,
    /// Detection and boundary ticks.
    Systems,
}

impl TimerScope {
    pub const ALL: [TimerScope; 5] = [
        TimerScope::Lobby,
        TimerScope::Selection,
        TimerScope::Results,
        TimerScope::Phase,
        TimerScope::Systems,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    LobbyCheck,
    SelectionTick,
    ResultsDone,
    PhaseCountdown,
    RoundClock,
    DetectionTick,
    BoundaryTick,
}

impl TimerKind {
    pub fn scope(self) -> TimerScope {
        match self {
            TimerKind::LobbyCheck => TimerScope::Lobby,
            TimerKind::SelectionTick => TimerScope::Selection,
            TimerKind::ResultsDone => TimerScope::Results,
            TimerKind::PhaseCountdown | TimerKind::RoundClock => TimerScope::Phase,
            TimerKind::DetectionTick | TimerKind::BoundaryTick => TimerScope::Systems,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// One timer expiry, delivered to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub id: TimerId,
    pub kind: TimerKind,
}

pub trait Scheduler: Send {
    /// Fire `kind` once after `delay`.
    fn schedule_once(&mut self, kind: TimerKind, delay: Duration) -> TimerId;
    /// Fire `kind` every `period`, first after one period.
    fn schedule_every(&mut self, kind: TimerKind, period: Duration) -> TimerId;
    /// Cancel every timer in `scope`.
    fn cancel_scope(&mut self, scope: TimerScope);
    /// Whether `fired` belongs to a live timer. One-shot timers are retired
    /// by their first accepted firing.
    fn accept(&mut self, fired: &TimerFired) -> bool;
    /// Number of live timers.
    fn live_count(&self) -> usize;

    fn cancel_all(&mut self) {
        for scope in TimerScope::ALL {
            self.cancel_scope(scope);
        }
    }
}

struct LiveTimer {
    kind: TimerKind,
    repeating: bool,
    handle: JoinHandle<()>,
}

/// Scheduler backed by tokio tasks. Each timer is a task that sends its
/// firings into `tx`.
pub struct TokioScheduler {
    tx: mpsc::UnboundedSender<TimerFired>,
    live: HashMap<TimerId, LiveTimer>,
    next_id: u64,
}

impl TokioScheduler {
    pub fn new(tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            tx,
            live: HashMap::new(),
            next_id: 0,
        }
    }

    fn alloc_id(&mut self) -> TimerId {
        self.next_id += 1;
        TimerId(self.next_id)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        let id = self.alloc_id();
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(TimerFired { id, kind });
        });
        self.live.insert(
            id,
            LiveTimer {
                kind,
                repeating: false,
                handle,
            },
        );
        id
    }

    fn schedule_every(&mut self, kind: TimerKind, period: Duration) -> TimerId {
        let id = self.alloc_id();
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(TimerFired { id, kind }).is_err() {
                    break;
                }
            }
        });
        self.live.insert(
            id,
            LiveTimer {
                kind,
                repeating: true,
                handle,
            },
        );
        id
    }

    fn cancel_scope(&mut self, scope: TimerScope) {
        self.live.retain(|_, timer| {
            if timer.kind.scope() == scope {
                timer.handle.abort();
                false
            } else {
                true
            }
        });
    }

    fn accept(&mut self, fired: &TimerFired) -> bool {
        let Some(timer) = self.live.get(&fired.id) else {
            return false;
        };
        if !timer.repeating {
            self.live.remove(&fired.id);
        }
        true
    }

    fn live_count(&self) -> usize {
        self.live.len()
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for timer in self.live.values() {
            timer.handle.abort();
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    id: TimerId,
    kind: TimerKind,
    period: Option<Duration>,
}

/// Deterministic scheduler on a simulated clock, for driving the state
/// machine synchronously in tests and replays.
#[derive(Debug)]
pub struct ManualScheduler {
    epoch: Instant,
    elapsed: Duration,
    next_id: u64,
    seq: u64,
    queue: BTreeMap<(Duration, u64), Pending>,
    live: HashMap<TimerId, Pending>,
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            elapsed: Duration::ZERO,
            next_id: 0,
            seq: 0,
            queue: BTreeMap::new(),
            live: HashMap::new(),
        }
    }

    /// Simulated wall clock.
    pub fn now(&self) -> Instant {
        self.epoch + self.elapsed
    }

    /// Simulated time since construction.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    fn insert(&mut self, kind: TimerKind, delay: Duration, period: Option<Duration>) -> TimerId {
        self.next_id += 1;
        let pending = Pending {
            id: TimerId(self.next_id),
            kind,
            period,
        };
        self.live.insert(pending.id, pending);
        self.push(self.elapsed + delay, pending);
        pending.id
    }

    fn push(&mut self, at: Duration, pending: Pending) {
        self.seq += 1;
        self.queue.insert((at, self.seq), pending);
    }

    /// Pop the earliest firing due at or before `deadline`, moving the clock
    /// to its expiry. Timers due at the same instant fire in the order they
    /// were queued.
    pub fn next_due(&mut self, deadline: Duration) -> Option<TimerFired> {
        let (&key, _) = self.queue.first_key_value()?;
        if key.0 > deadline {
            return None;
        }
        let pending = self.queue.remove(&key)?;
        self.elapsed = self.elapsed.max(key.0);
        if let Some(period) = pending.period {
            self.push(key.0 + period, pending);
        }
        Some(TimerFired {
            id: pending.id,
            kind: pending.kind,
        })
    }

    /// Move the clock forward without firing anything.
    pub fn advance_to(&mut self, t: Duration) {
        self.elapsed = self.elapsed.max(t);
    }

    pub fn is_scheduled(&self, kind: TimerKind) -> bool {
        self.live.values().any(|p| p.kind == kind)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&mut self, kind: TimerKind, delay: Duration) -> TimerId {
        self.insert(kind, delay, None)
    }

    fn schedule_every(&mut self, kind: TimerKind, period: Duration) -> TimerId {
        self.insert(kind, period, Some(period))
    }

    fn cancel_scope(&mut self, scope: TimerScope) {
        self.live.retain(|_, p| p.kind.scope() != scope);
        self.queue.retain(|_, p| p.kind.scope() != scope);
    }

    fn accept(&mut self, fired: &TimerFired) -> bool {
        let Some(pending) = self.live.get(&fired.id) else {
            return false;
        };
        if pending.period.is_none() {
            self.live.remove(&fired.id);
        }
        true
    }

    fn live_count(&self) -> usize {
        self.live.len()
    }
}
