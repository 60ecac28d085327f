use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::address::Address;

use super::{Candidate, CandidateId, ElectionWindow, EventKind, LedgerEvent, Treasury};

/// A complete, self-describing snapshot of a ledger, as served by
/// `GET /ledgers/<ledger_id>/dump`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDump {
    pub owner: Address,
    pub window: ElectionWindow,
    pub candidates: Vec<Candidate>,
    /// Every address that has voted, in sorted order.
    pub voters: Vec<Address>,
    pub treasury: Treasury,
    pub events: Vec<LedgerEvent>,
}

/// Ways in which a dump can fail to add up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuditError {
    #[error("Candidate at position {position} has ID {id}")]
    CandidateIds { position: usize, id: CandidateId },
    #[error("Event at position {position} claims sequence number {seq}")]
    EventSequence { position: usize, seq: u64 },
    #[error("Event {seq} adds candidate {id} out of order")]
    CandidateOrder { seq: u64, id: CandidateId },
    #[error("Journal adds {replayed} candidates but the ledger lists {recorded}")]
    CandidateCount { recorded: usize, replayed: usize },
    #[error("Event {seq} votes for unknown candidate {candidate_id}")]
    UnknownCandidate { seq: u64, candidate_id: CandidateId },
    #[error("Address {voter} voted more than once (again in event {seq})")]
    DoubleVote { seq: u64, voter: Address },
    #[error("Tally for candidate {candidate_id} is {recorded}, journal gives {replayed}")]
    Tally {
        candidate_id: CandidateId,
        recorded: u64,
        replayed: u64,
    },
    #[error("Sum of tallies is {tallies} but {voters} addresses have voted")]
    VoteTotal { tallies: u128, voters: usize },
    #[error("Recorded voters do not match the voters in the journal")]
    Voters,
    #[error("Event {seq} pays {to}, who is not the owner")]
    NonOwnerWithdrawal { seq: u64, to: Address },
    #[error("Event {seq} withdraws more than the balance at that point")]
    Overdraft { seq: u64 },
    #[error("Treasury records {recorded:?} but the journal gives {replayed:?}")]
    Treasury {
        recorded: (u128, u128, u128),
        replayed: (u128, u128, u128),
    },
}

impl LedgerDump {
    /// Replay the journal and check it against the recorded state.
    pub fn audit(&self) -> Result<(), AuditError> {
        for (position, candidate) in self.candidates.iter().enumerate() {
            if candidate.id as usize != position {
                return Err(AuditError::CandidateIds {
                    position,
                    id: candidate.id,
                });
            }
        }

        let tallies: u128 = self
            .candidates
            .iter()
            .map(|c| u128::from(c.vote_count))
            .sum();
        if tallies != self.voters.len() as u128 {
            return Err(AuditError::VoteTotal {
                tallies,
                voters: self.voters.len(),
            });
        }

        let mut replayed_tallies: Vec<u64> = Vec::new();
        let mut replayed_voters = BTreeSet::new();
        // Balance, deposited, withdrawn. Wide enough that replay cannot overflow.
        let mut balance: u128 = 0;
        let mut deposited: u128 = 0;
        let mut withdrawn: u128 = 0;

        for (position, event) in self.events.iter().enumerate() {
            let seq = event.seq;
            if seq != position as u64 {
                return Err(AuditError::EventSequence { position, seq });
            }
            match &event.kind {
                EventKind::CandidateAdded { id, .. } => {
                    if *id as usize != replayed_tallies.len() {
                        return Err(AuditError::CandidateOrder { seq, id: *id });
                    }
                    replayed_tallies.push(0);
                }
                EventKind::VoteCast {
                    voter,
                    candidate_id,
                } => {
                    let tally = replayed_tallies
                        .get_mut(*candidate_id as usize)
                        .ok_or(AuditError::UnknownCandidate {
                            seq,
                            candidate_id: *candidate_id,
                        })?;
                    if !replayed_voters.insert(voter.clone()) {
                        return Err(AuditError::DoubleVote {
                            seq,
                            voter: voter.clone(),
                        });
                    }
                    *tally += 1;
                }
                EventKind::Deposited { amount, .. } => {
                    balance += u128::from(*amount);
                    deposited += u128::from(*amount);
                }
                EventKind::Withdrawn { to, amount } => {
                    if to != &self.owner {
                        return Err(AuditError::NonOwnerWithdrawal {
                            seq,
                            to: to.clone(),
                        });
                    }
                    balance = balance
                        .checked_sub(u128::from(*amount))
                        .ok_or(AuditError::Overdraft { seq })?;
                    withdrawn += u128::from(*amount);
                }
            }
        }

        if replayed_tallies.len() != self.candidates.len() {
            return Err(AuditError::CandidateCount {
                recorded: self.candidates.len(),
                replayed: replayed_tallies.len(),
            });
        }
        for (candidate, replayed) in self.candidates.iter().zip(&replayed_tallies) {
            if candidate.vote_count != *replayed {
                return Err(AuditError::Tally {
                    candidate_id: candidate.id,
                    recorded: candidate.vote_count,
                    replayed: *replayed,
                });
            }
        }

        let recorded_voters: BTreeSet<&Address> = self.voters.iter().collect();
        if recorded_voters.len() != self.voters.len()
            || !recorded_voters.iter().copied().eq(replayed_voters.iter())
        {
            return Err(AuditError::Voters);
        }

        let recorded = (
            u128::from(self.treasury.balance()),
            u128::from(self.treasury.total_deposited()),
            u128::from(self.treasury.total_withdrawn()),
        );
        let replayed = (balance, deposited, withdrawn);
        if recorded != replayed {
            return Err(AuditError::Treasury { recorded, replayed });
        }

        Ok(())
    }
}
