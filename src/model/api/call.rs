use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    address::Address,
    ledger::{Amount, Candidate, ElectionResults, Ledger, LedgerDump, LedgerEvent, Payout},
};

use super::{
    BallotRequest, CandidateCreated, CandidateQuery, EventQuery, Funds, NewCandidate, VoterQuery,
    WindowDesc,
};

/// Any ledger operation, as a single tagged request:
/// `{ "operation": "vote", "payload": { "candidateId": 0 } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "camelCase")]
pub enum LedgerCall {
    AddCandidate(NewCandidate),
    Vote(BallotRequest),
    DepositFunds(Funds),
    WithdrawFunds(Funds),
    HasVoted(VoterQuery),
    GetCandidate(CandidateQuery),
    ListCandidates,
    GetContractBalance,
    GetWindow,
    Results,
    Events(EventQuery),
    Dump,
}

/// The result of a [`LedgerCall`], serialised without a tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CallOutput {
    Done,
    CandidateCreated(CandidateCreated),
    Payout(Payout),
    Flag(bool),
    Amount(Amount),
    Candidate(Candidate),
    Candidates(Vec<Candidate>),
    Window(WindowDesc),
    Results(ElectionResults),
    Events(Vec<LedgerEvent>),
    Dump(Box<LedgerDump>),
}

impl LedgerCall {
    /// Whether this call leaves the ledger untouched.
    pub fn is_query(&self) -> bool {
        !matches!(
            self,
            Self::AddCandidate(_) | Self::Vote(_) | Self::DepositFunds(_) | Self::WithdrawFunds(_)
        )
    }

    /// Answer a read-only call.
    pub fn query(&self, ledger: &Ledger, now: DateTime<Utc>) -> Result<CallOutput> {
        Ok(match self {
            Self::HasVoted(q) => CallOutput::Flag(ledger.has_voted(&q.address)),
            Self::GetCandidate(q) => CallOutput::Candidate(ledger.candidate(q.candidate_id)?.clone()),
            Self::ListCandidates => CallOutput::Candidates(ledger.candidates().to_vec()),
            Self::GetContractBalance => CallOutput::Amount(ledger.balance()),
            Self::GetWindow => CallOutput::Window(WindowDesc::new(ledger.window(), now)),
            Self::Results => CallOutput::Results(ledger.results(now)?),
            Self::Events(q) => CallOutput::Events(ledger.events(q.since).to_vec()),
            Self::Dump => CallOutput::Dump(Box::new(ledger.dump())),
            Self::AddCandidate(_) | Self::Vote(_) | Self::DepositFunds(_) | Self::WithdrawFunds(_) => {
                return Err(Error::bad_request("Mutating operations need a caller"))
            }
        })
    }

    /// Apply any call on behalf of `caller`.
    pub fn execute(
        self,
        caller: &Address,
        ledger: &mut Ledger,
        now: DateTime<Utc>,
    ) -> Result<CallOutput> {
        match self {
            Self::AddCandidate(c) => Ok(CallOutput::CandidateCreated(CandidateCreated {
                candidate_id: ledger.add_candidate(caller, &c.name, now)?,
            })),
            Self::Vote(b) => {
                ledger.vote(caller, b.candidate_id, now)?;
                Ok(CallOutput::Done)
            }
            Self::DepositFunds(f) => {
                ledger.deposit(caller, f.amount, now)?;
                Ok(CallOutput::Done)
            }
            Self::WithdrawFunds(f) => Ok(CallOutput::Payout(ledger.withdraw(caller, f.amount, now)?)),
            query => query.query(ledger, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::{json, serde_json};

    use crate::model::ledger::examples::example_start;

    use super::*;

    fn call(value: serde_json::Value) -> LedgerCall {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parses_tagged_requests() {
        assert_eq!(
            call(json!({ "operation": "vote", "payload": { "candidateId": 2 } })),
            LedgerCall::Vote(BallotRequest { candidate_id: 2 })
        );
        assert_eq!(
            call(json!({ "operation": "getWindow" })),
            LedgerCall::GetWindow
        );
        assert!(serde_json::from_value::<LedgerCall>(json!({ "operation": "selfDestruct" })).is_err());
    }

    #[test]
    fn dispatches_to_the_ledger() {
        let mut ledger = Ledger::example();
        let now = example_start();
        let owner = Address::owner_example();
        let voter = Address::voter_example(0);

        let added = call(json!({ "operation": "addCandidate", "payload": { "name": "Alice" } }))
            .execute(&voter, &mut ledger, now)
            .unwrap();
        assert_eq!(
            added,
            CallOutput::CandidateCreated(CandidateCreated { candidate_id: 0 })
        );

        let vote = call(json!({ "operation": "vote", "payload": { "candidateId": 0 } }));
        assert!(!vote.is_query());
        assert_eq!(vote.clone().execute(&voter, &mut ledger, now), Ok(CallOutput::Done));
        assert_eq!(
            vote.execute(&voter, &mut ledger, now),
            Err(Error::AlreadyVoted(voter.clone()))
        );

        let has_voted = call(json!({ "operation": "hasVoted", "payload": { "address": voter.as_str() } }));
        assert!(has_voted.is_query());
        assert_eq!(has_voted.query(&ledger, now), Ok(CallOutput::Flag(true)));

        call(json!({ "operation": "depositFunds", "payload": { "amount": 100 } }))
            .execute(&voter, &mut ledger, now)
            .unwrap();
        assert_eq!(
            call(json!({ "operation": "withdrawFunds", "payload": { "amount": 40 } }))
                .execute(&owner, &mut ledger, now),
            Ok(CallOutput::Payout(Payout {
                to: owner.clone(),
                amount: 40
            }))
        );
        assert_eq!(
            LedgerCall::GetContractBalance.query(&ledger, now),
            Ok(CallOutput::Amount(60))
        );
    }

    #[test]
    fn queries_refuse_mutations() {
        let ledger = Ledger::example();
        let call = LedgerCall::DepositFunds(Funds { amount: 1 });
        assert!(matches!(
            call.query(&ledger, example_start()),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn outputs_are_untagged() {
        assert_eq!(serde_json::to_value(CallOutput::Done).unwrap(), json!(null));
        assert_eq!(serde_json::to_value(CallOutput::Flag(false)).unwrap(), json!(false));
    }
}
