use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::address::Address;

use super::{Amount, CandidateId};

/// One committed mutation. The journal is append-only and `seq` equals the
/// entry's position in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
    CandidateAdded {
        id: CandidateId,
        name: String,
        by: Address,
    },
    #[serde(rename_all = "camelCase")]
    VoteCast {
        voter: Address,
        candidate_id: CandidateId,
    },
    Deposited {
        from: Address,
        amount: Amount,
    },
    Withdrawn {
        to: Address,
        amount: Amount,
    },
}
