//! Request and response types of the HTTP interface.

mod call;
mod caller;
mod desc;
pub mod envelope;
mod requests;

pub use call::{CallOutput, LedgerCall};
pub use caller::{Caller, GuardRejection, CALLER_HEADER};
pub use desc::{CandidateCreated, LedgerCreated, LedgerSummary, WindowDesc};
pub use envelope::{Envelope, Reply};
pub use requests::{BallotRequest, CandidateQuery, EventQuery, Funds, NewCandidate, NewLedger, VoterQuery};
