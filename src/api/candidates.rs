use rocket::{get, post, routes, Route, State};

use crate::error::Result;
use crate::model::{
    api::{CandidateCreated, Caller, NewCandidate, Reply},
    ledger::{Candidate, CandidateId},
    registry::{LedgerId, Ledgers},
};

use super::{body, Body};

pub fn routes() -> Vec<Route> {
    routes![add_candidate, list_candidates, get_candidate]
}

#[post("/ledgers/<ledger_id>/candidates", data = "<candidate>")]
async fn add_candidate(
    ledger_id: LedgerId,
    caller: Caller,
    candidate: Body<'_, NewCandidate>,
    ledgers: &State<Ledgers>,
) -> Result<Reply<CandidateCreated>> {
    let candidate = body(candidate)?;
    let candidate_id = ledgers
        .mutate(ledger_id, |ledger, now| {
            ledger.add_candidate(&caller.0, &candidate.name, now)
        })
        .await?;
    Ok(Reply(CandidateCreated { candidate_id }))
}

#[get("/ledgers/<ledger_id>/candidates")]
async fn list_candidates(
    ledger_id: LedgerId,
    ledgers: &State<Ledgers>,
) -> Result<Reply<Vec<Candidate>>> {
    let candidates = ledgers
        .inspect(ledger_id, |ledger, _| ledger.candidates().to_vec())
        .await?;
    Ok(Reply(candidates))
}

#[get("/ledgers/<ledger_id>/candidates/<candidate_id>")]
async fn get_candidate(
    ledger_id: LedgerId,
    candidate_id: CandidateId,
    ledgers: &State<Ledgers>,
) -> Result<Reply<Candidate>> {
    let candidate = ledgers
        .inspect(ledger_id, |ledger, _| ledger.candidate(candidate_id).cloned())
        .await??;
    Ok(Reply(candidate))
}

#[cfg(test)]
mod tests {
    use backend_test::backend_test;
    use chrono::Duration;
    use rocket::{http::Status, local::asynchronous::Client, serde::json::json, uri};

    use crate::error::ErrorKind;
    use crate::model::{address::Address, api::Envelope, clock::ManualClock};

    use super::super::test_helpers::*;
    use super::*;

    async fn add(client: &Client, name: &str) -> Envelope<CandidateCreated> {
        let response = client
            .post(uri!(add_candidate(0)))
            .header(caller(&Address::voter_example(9)))
            .json(&json!({ "name": name }))
            .dispatch()
            .await;
        envelope(response).await
    }

    #[backend_test(ledger)]
    async fn anyone_can_add_candidates(client: Client) {
        let first = add(&client, "Alice").await;
        assert_eq!(first.result, Some(CandidateCreated { candidate_id: 0 }));
        let second = add(&client, "Alice").await;
        assert_eq!(second.result, Some(CandidateCreated { candidate_id: 1 }));

        let response = client.get(uri!(list_candidates(0))).dispatch().await;
        let candidates = envelope::<Vec<Candidate>>(response).await.result.unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.name == "Alice" && c.vote_count == 0));
    }

    #[backend_test(ledger)]
    async fn candidates_can_be_added_after_close(client: Client, clock: ManualClock) {
        clock.advance(Duration::days(2));
        assert_eq!(
            add(&client, "Latecomer").await.result,
            Some(CandidateCreated { candidate_id: 0 })
        );
    }

    #[backend_test(ledger)]
    async fn blank_names_are_rejected(client: Client) {
        let rejected = add(&client, "  ").await;
        assert!(!rejected.ok);
        assert_eq!(rejected.error_kind, Some(ErrorKind::BadRequest));
    }

    #[backend_test(ledger)]
    async fn get_candidate_reports_tally(client: Client) {
        add(&client, "Alice").await;
        client
            .post("/ledgers/0/votes")
            .header(caller(&Address::voter_example(0)))
            .json(&json!({ "candidateId": 0 }))
            .dispatch()
            .await;

        let response = client.get(uri!(get_candidate(0, 0))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let candidate = envelope::<Candidate>(response).await.result.unwrap();
        assert_eq!(candidate.name, "Alice");
        assert_eq!(candidate.vote_count, 1);
    }

    #[backend_test(ledger)]
    async fn get_unknown_candidate_fails(client: Client) {
        add(&client, "Alice").await;

        let response = client.get(uri!(get_candidate(0, 5))).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let envelope = envelope::<()>(response).await;
        assert_eq!(envelope.error_kind, Some(ErrorKind::InvalidCandidate));
        assert_eq!(envelope.message.as_deref(), Some("No candidate with ID 5"));
    }
}
