use serde::{Deserialize, Serialize};

use crate::Error;

/// A vote direction as requested over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            other => Err(Error::Validation(format!(
                "direction must be \"up\" or \"down\", got \"{}\"",
                other
            ))),
        }
    }

    pub fn value(self) -> i8 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }
}

/// The target of a vote: exactly one of a question or an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteTarget {
    Question(u64),
    Answer(u64),
}

impl VoteTarget {
    pub fn kind(&self) -> &'static str {
        match self {
            VoteTarget::Question(_) => "question",
            VoteTarget::Answer(_) => "answer",
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            VoteTarget::Question(id) | VoteTarget::Answer(id) => *id,
        }
    }
}

/// A persisted vote row.
#[derive(Debug, Clone)]
pub struct Vote {
    pub id: u64,
    pub voter_id: u64,
    pub target: VoteTarget,
    pub value: i8,
    pub created_at: i64,
}

/// What the store must do to the (voter, target) vote row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// No row exists; create one with this value.
    Create(i8),
    /// A row with the same value exists; remove it (toggle off).
    Remove,
    /// A row with the opposite value exists; update it to this value.
    Flip(i8),
}

/// The vote toggle rule. Guarantees that at most one row per
/// (voter, target) pair can ever result from applying the outcome.
pub fn transition(existing: Option<i8>, requested: i8) -> Transition {
    match existing {
        None => Transition::Create(requested),
        Some(v) if v == requested => Transition::Remove,
        Some(_) => Transition::Flip(requested),
    }
}

/// Resulting vote state plus the authoritative score, recomputed from
/// all vote rows for the target rather than adjusted incrementally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub vote: Option<i8>,
    pub votes: i64,
}
