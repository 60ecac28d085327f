use serde::{Deserialize, Serialize};

use super::CandidateId;

/// A registered candidate and its running tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Dense, zero-based, assigned in creation order.
    pub id: CandidateId,
    pub name: String,
    pub vote_count: u64,
}

impl Candidate {
    pub(super) fn new(id: CandidateId, name: String) -> Self {
        Self {
            id,
            name,
            vote_count: 0,
        }
    }
}
