use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    address::Address,
    ledger::{Amount, CandidateId, ElectionWindow, Ledger, Phase},
    registry::LedgerId,
};

/// The voting window as served by `getWindow`, with the derived values a
/// front end needs to show a countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowDesc {
    pub start_time: DateTime<Utc>,
    pub duration_seconds: u64,
    pub end_time: DateTime<Utc>,
    pub is_open: bool,
    /// Zero once voting has closed.
    pub remaining_seconds: u64,
}

impl WindowDesc {
    pub fn new(window: &ElectionWindow, now: DateTime<Utc>) -> Self {
        Self {
            start_time: window.start_time(),
            duration_seconds: window.duration_seconds(),
            end_time: window.end_time(),
            is_open: window.is_open(now),
            remaining_seconds: window.remaining_seconds(now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerCreated {
    pub ledger_id: LedgerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateCreated {
    pub candidate_id: CandidateId,
}

/// One entry of `GET /ledgers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub ledger_id: LedgerId,
    pub owner: Address,
    pub phase: Phase,
    pub end_time: DateTime<Utc>,
    pub candidate_count: usize,
    pub total_votes: u64,
    pub balance: Amount,
}

impl LedgerSummary {
    pub fn new(ledger_id: LedgerId, ledger: &Ledger, now: DateTime<Utc>) -> Self {
        Self {
            ledger_id,
            owner: ledger.owner().clone(),
            phase: ledger.window().phase(now),
            end_time: ledger.window().end_time(),
            candidate_count: ledger.candidates().len(),
            total_votes: ledger.total_votes(),
            balance: ledger.balance(),
        }
    }
}
