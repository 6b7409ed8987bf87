use serde::{Deserialize, Serialize};

/// Effects the round logic knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    /// One-shot protection. Blocks a freeze on a Runner, or forces one
    /// through when held by the freezing Seeker. Lasts until spent.
    Shield,
}
