use rocket::{get, post, routes, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    address::Address,
    api::{BallotRequest, Caller, Reply},
    registry::{LedgerId, Ledgers},
};

use super::{body, Body};

pub fn routes() -> Vec<Route> {
    routes![vote, has_voted]
}

#[post("/ledgers/<ledger_id>/votes", data = "<ballot>")]
async fn vote(
    ledger_id: LedgerId,
    caller: Caller,
    ballot: Body<'_, BallotRequest>,
    ledgers: &State<Ledgers>,
) -> Result<Reply<()>> {
    let ballot = body(ballot)?;
    ledgers
        .mutate(ledger_id, |ledger, now| {
            ledger.vote(&caller.0, ballot.candidate_id, now)
        })
        .await?;
    Ok(Reply(()))
}

#[get("/ledgers/<ledger_id>/voters/<address>")]
async fn has_voted(
    ledger_id: LedgerId,
    address: std::result::Result<Address, Error>,
    ledgers: &State<Ledgers>,
) -> Result<Reply<bool>> {
    let address = address?;
    let voted = ledgers
        .inspect(ledger_id, |ledger, _| ledger.has_voted(&address))
        .await?;
    Ok(Reply(voted))
}
