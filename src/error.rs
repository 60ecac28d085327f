use chrono::{DateTime, Utc};
use log::warn;
use rocket::{
    http::Status,
    response::{status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    address::Address,
    api::envelope::Envelope,
    ledger::{Amount, CandidateId},
    registry::LedgerId,
};

pub type Result<T> = std::result::Result<T, Error>;

/// Every way a ledger call can be rejected. A rejected call never leaves
/// a partial mutation behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Voting closed at {closed_at}")]
    VotingClosed { closed_at: DateTime<Utc> },
    #[error("Address {0} has already voted")]
    AlreadyVoted(Address),
    #[error("No candidate with ID {0}")]
    InvalidCandidate(CandidateId),
    #[error("Address {0} is not the ledger owner")]
    Unauthorized(Address),
    #[error("Cannot withdraw {requested}: balance is only {available}")]
    InsufficientFunds { requested: Amount, available: Amount },
    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),
    #[error("Results are not final until voting closes at {closes_at}")]
    VotingOpen { closes_at: DateTime<Utc> },
    #[error("No ledger with ID {0}")]
    UnknownLedger(LedgerId),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Error {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// The wire tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::VotingClosed { .. } => ErrorKind::VotingClosed,
            Self::AlreadyVoted(_) => ErrorKind::AlreadyVoted,
            Self::InvalidCandidate(_) => ErrorKind::InvalidCandidate,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::Overflow(_) => ErrorKind::Overflow,
            Self::VotingOpen { .. } => ErrorKind::VotingOpen,
            Self::UnknownLedger(_) => ErrorKind::UnknownLedger,
            Self::BadRequest(_) => ErrorKind::BadRequest,
        }
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::VotingClosed { .. } => Status::Forbidden,
            Self::AlreadyVoted(_) | Self::VotingOpen { .. } => Status::Conflict,
            Self::InvalidCandidate(_) | Self::UnknownLedger(_) => Status::NotFound,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::InsufficientFunds { .. } | Self::Overflow(_) => Status::UnprocessableEntity,
            Self::BadRequest(_) => Status::BadRequest,
        }
    }
}

/// Error tags as they appear in the `errorKind` field of a failed response.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    VotingClosed,
    AlreadyVoted,
    InvalidCandidate,
    Unauthorized,
    InsufficientFunds,
    Overflow,
    VotingOpen,
    UnknownLedger,
    BadRequest,
    /// Unmatched routes. Only produced by the catchers.
    NotFound,
    /// Only produced by the catchers, never by the ledger itself.
    Internal,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        warn!("Rejected {} {}: {}", req.method(), req.uri(), self);
        let status = self.status();
        let body = Envelope::<()>::failure(self.kind(), self.to_string());
        Custom(status, Json(body)).respond_to(req)
    }
}
