use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::address::Address;

use super::{
    Amount, Candidate, CandidateId, ElectionResults, ElectionWindow, EventKind, LedgerDump,
    LedgerEvent, Treasury,
};

/// Everything needed to create a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerConfig {
    /// The only address allowed to withdraw funds.
    pub owner: Address,
    /// Length of the voting window, counted from creation.
    pub duration_seconds: u64,
}

/// Funds leaving the treasury, to be transferred by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payout {
    pub to: Address,
    pub amount: Amount,
}

/// The state of one election: its candidates, who has voted, its voting
/// window and its treasury.
///
/// Every operation validates all of its preconditions before touching any
/// state, so a rejected call leaves the ledger exactly as it was. Callers
/// must serialise mutations; see [`crate::model::registry::Ledgers`].
#[derive(Debug, Clone)]
pub struct Ledger {
    owner: Address,
    window: ElectionWindow,
    candidates: Vec<Candidate>,
    voted: BTreeSet<Address>,
    treasury: Treasury,
    events: Vec<LedgerEvent>,
}

impl Ledger {
    /// Create an empty ledger whose voting window opens at `now`.
    pub fn new(config: LedgerConfig, now: DateTime<Utc>) -> Self {
        Self {
            owner: config.owner,
            window: ElectionWindow::new(now, config.duration_seconds),
            candidates: Vec::new(),
            voted: BTreeSet::new(),
            treasury: Treasury::default(),
            events: Vec::new(),
        }
    }

    pub fn owner(&self) -> &Address {
        &self.owner
    }

    pub fn window(&self) -> &ElectionWindow {
        &self.window
    }

    /// Register a candidate. Anyone may do this at any time; duplicate
    /// names are allowed. Names are stored exactly as given, but must not
    /// be blank.
    pub fn add_candidate(
        &mut self,
        caller: &Address,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<CandidateId> {
        if name.trim().is_empty() {
            return Err(Error::bad_request("Candidate name must not be empty"));
        }
        let id = CandidateId::try_from(self.candidates.len())
            .map_err(|_| Error::Overflow("candidate count"))?;

        self.candidates.push(Candidate::new(id, name.to_string()));
        self.record(
            now,
            EventKind::CandidateAdded {
                id,
                name: name.to_string(),
                by: caller.clone(),
            },
        );
        info!("Candidate {id} ({name}) added by {caller}");
        Ok(id)
    }

    /// Cast `caller`'s single vote for `candidate_id`.
    ///
    /// Preconditions are checked in order: the window is open, the caller
    /// has not voted, the candidate exists.
    pub fn vote(
        &mut self,
        caller: &Address,
        candidate_id: CandidateId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.window.is_open(now) {
            return Err(Error::VotingClosed {
                closed_at: self.window.end_time(),
            });
        }
        if self.voted.contains(caller) {
            return Err(Error::AlreadyVoted(caller.clone()));
        }
        let candidate = self
            .candidates
            .get_mut(candidate_id as usize)
            .ok_or(Error::InvalidCandidate(candidate_id))?;
        let vote_count = candidate
            .vote_count
            .checked_add(1)
            .ok_or(Error::Overflow("vote count"))?;

        candidate.vote_count = vote_count;
        self.voted.insert(caller.clone());
        self.record(
            now,
            EventKind::VoteCast {
                voter: caller.clone(),
                candidate_id,
            },
        );
        info!("Vote from {caller} for candidate {candidate_id} accepted");
        Ok(())
    }

    pub fn has_voted(&self, address: &Address) -> bool {
        self.voted.contains(address)
    }

    pub fn candidate(&self, candidate_id: CandidateId) -> Result<&Candidate> {
        self.candidates
            .get(candidate_id as usize)
            .ok_or(Error::InvalidCandidate(candidate_id))
    }

    /// All candidates in ID order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Number of addresses that have voted, which is also the sum of all tallies.
    pub fn total_votes(&self) -> u64 {
        self.voted.len() as u64
    }

    /// Add funds. Anyone may deposit, and a zero deposit is allowed.
    pub fn deposit(&mut self, caller: &Address, amount: Amount, now: DateTime<Utc>) -> Result<()> {
        self.treasury.credit(amount)?;
        self.record(
            now,
            EventKind::Deposited {
                from: caller.clone(),
                amount,
            },
        );
        info!(
            "Deposit of {amount} from {caller}, balance now {}",
            self.treasury.balance()
        );
        Ok(())
    }

    /// Withdraw funds to the owner.
    pub fn withdraw(
        &mut self,
        caller: &Address,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<Payout> {
        if caller != &self.owner {
            return Err(Error::Unauthorized(caller.clone()));
        }
        self.treasury.debit(amount)?;
        self.record(
            now,
            EventKind::Withdrawn {
                to: caller.clone(),
                amount,
            },
        );
        info!(
            "Withdrawal of {amount} to {caller}, balance now {}",
            self.treasury.balance()
        );
        Ok(Payout {
            to: caller.clone(),
            amount,
        })
    }

    pub fn balance(&self) -> Amount {
        self.treasury.balance()
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    /// Journal entries from sequence number `since` onwards.
    pub fn events(&self, since: u64) -> &[LedgerEvent] {
        let start = usize::try_from(since)
            .unwrap_or(usize::MAX)
            .min(self.events.len());
        &self.events[start..]
    }

    /// Final tallies. Only available once voting has closed.
    pub fn results(&self, now: DateTime<Utc>) -> Result<ElectionResults> {
        if self.window.is_open(now) {
            return Err(Error::VotingOpen {
                closes_at: self.window.end_time(),
            });
        }
        Ok(ElectionResults::tally(&self.candidates, self.total_votes()))
    }

    /// A complete snapshot, suitable for export and offline audit.
    pub fn dump(&self) -> LedgerDump {
        LedgerDump {
            owner: self.owner.clone(),
            window: self.window.clone(),
            candidates: self.candidates.clone(),
            voters: self.voted.iter().cloned().collect(),
            treasury: self.treasury.clone(),
            events: self.events.clone(),
        }
    }

    fn record(&mut self, at: DateTime<Utc>, kind: EventKind) {
        let seq = self.events.len() as u64;
        self.events.push(LedgerEvent { seq, at, kind });
    }
}
