//! Up/down voting shared by forum posts and topic replies.
//!
//! Votes are stored as flat `(target, user, value)` rows. Totals are never
//! stored; they are derived on read with [`tally`].

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    /// Stored integer form (+1 / -1).
    pub fn as_i64(self) -> i64 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(VoteValue::Up),
            -1 => Some(VoteValue::Down),
            _ => None,
        }
    }
}

impl FromStr for VoteValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(VoteValue::Up),
            "down" => Ok(VoteValue::Down),
            other => Err(format!("unknown vote '{}'", other)),
        }
    }
}

/// What to do with the stored row when a user votes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    Insert(VoteValue),
    /// Same vote again toggles it off.
    Remove,
    Switch(VoteValue),
}

/// Decide the change for a `requested` vote given the user's `existing` one.
pub fn resolve(existing: Option<VoteValue>, requested: VoteValue) -> VoteChange {
    match existing {
        None => VoteChange::Insert(requested),
        Some(current) if current == requested => VoteChange::Remove,
        Some(_) => VoteChange::Switch(requested),
    }
}

/// A stored vote row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub target_id: String,
    pub user_id: String,
    pub value: VoteValue,
}

/// Derived totals for one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub upvotes: u32,
    pub downvotes: u32,
    pub score: i64,
    /// The viewer's own vote, if any.
    pub my_vote: Option<VoteValue>,
}

impl VoteTally {
    fn add(&mut self, vote: &Vote, viewer: Option<&str>) {
        match vote.value {
            VoteValue::Up => self.upvotes += 1,
            VoteValue::Down => self.downvotes += 1,
        }
        self.score += vote.value.as_i64();
        if viewer == Some(vote.user_id.as_str()) {
            self.my_vote = Some(vote.value);
        }
    }
}

/// Group votes by target.
pub fn tally(votes: &[Vote], viewer: Option<&str>) -> HashMap<String, VoteTally> {
    let mut totals: HashMap<String, VoteTally> = HashMap::new();
    for vote in votes {
        totals
            .entry(vote.target_id.clone())
            .or_default()
            .add(vote, viewer);
    }
    totals
}

/// Tally for `target_id`, zero if it has no votes.
pub fn tally_for(totals: &HashMap<String, VoteTally>, target_id: &str) -> VoteTally {
    totals.get(target_id).copied().unwrap_or_default()
}
