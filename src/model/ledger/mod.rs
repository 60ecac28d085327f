mod candidate;
mod dump;
mod event;
mod ledger_core;
mod results;
mod treasury;
mod window;

pub use candidate::Candidate;
pub use dump::{AuditError, LedgerDump};
pub use event::{EventKind, LedgerEvent};
pub use ledger_core::{Ledger, LedgerConfig, Payout};
pub use results::ElectionResults;
pub use treasury::Treasury;
pub use window::{ElectionWindow, Phase};

#[cfg(test)]
pub(crate) use ledger_core::examples;

/// Candidate IDs are dense indices into the candidate list.
pub type CandidateId = u32;
/// Amounts are in the smallest monetary unit.
pub type Amount = u64;
