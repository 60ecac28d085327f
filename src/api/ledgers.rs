use rocket::{get, post, routes, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{CallOutput, Caller, LedgerCall, LedgerCreated, LedgerSummary, NewLedger, Reply, WindowDesc},
    ledger::{ElectionResults, LedgerDump, LedgerEvent},
    registry::{LedgerId, Ledgers},
};

use super::{body, Body};

pub fn routes() -> Vec<Route> {
    routes![
        create_ledger,
        list_ledgers,
        window,
        results,
        events,
        dump,
        dispatch_call,
    ]
}

#[post("/ledgers", data = "<new_ledger>")]
async fn create_ledger(
    caller: Caller,
    new_ledger: Body<'_, NewLedger>,
    ledgers: &State<Ledgers>,
) -> Result<Reply<LedgerCreated>> {
    let new_ledger = body(new_ledger)?;
    let ledger_id = ledgers.create(caller.0, new_ledger.duration_seconds).await?;
    Ok(Reply(LedgerCreated { ledger_id }))
}

#[get("/ledgers")]
async fn list_ledgers(ledgers: &State<Ledgers>) -> Result<Reply<Vec<LedgerSummary>>> {
    let mut summaries = Vec::new();
    for ledger_id in (0..).take(ledgers.len().await) {
        let summary = ledgers
            .inspect(ledger_id, |ledger, now| LedgerSummary::new(ledger_id, ledger, now))
            .await?;
        summaries.push(summary);
    }
    Ok(Reply(summaries))
}

#[get("/ledgers/<ledger_id>/window")]
async fn window(ledger_id: LedgerId, ledgers: &State<Ledgers>) -> Result<Reply<WindowDesc>> {
    let window = ledgers
        .inspect(ledger_id, |ledger, now| WindowDesc::new(ledger.window(), now))
        .await?;
    Ok(Reply(window))
}

#[get("/ledgers/<ledger_id>/results")]
async fn results(ledger_id: LedgerId, ledgers: &State<Ledgers>) -> Result<Reply<ElectionResults>> {
    let results = ledgers
        .inspect(ledger_id, |ledger, now| ledger.results(now))
        .await??;
    Ok(Reply(results))
}

#[get("/ledgers/<ledger_id>/events?<since>")]
async fn events(
    ledger_id: LedgerId,
    since: Option<u64>,
    ledgers: &State<Ledgers>,
) -> Result<Reply<Vec<LedgerEvent>>> {
    let events = ledgers
        .inspect(ledger_id, |ledger, _| ledger.events(since.unwrap_or(0)).to_vec())
        .await?;
    Ok(Reply(events))
}

#[get("/ledgers/<ledger_id>/dump")]
async fn dump(ledger_id: LedgerId, ledgers: &State<Ledgers>) -> Result<Reply<LedgerDump>> {
    let dump = ledgers.inspect(ledger_id, |ledger, _| ledger.dump()).await?;
    Ok(Reply(dump))
}

/// Run any ledger operation given as `{ operation, payload }`. Queries do
/// not need a caller.
#[post("/ledgers/<ledger_id>/call", data = "<call>")]
async fn dispatch_call(
    ledger_id: LedgerId,
    caller: std::result::Result<Caller, Error>,
    call: Body<'_, LedgerCall>,
    ledgers: &State<Ledgers>,
) -> Result<Reply<CallOutput>> {
    let call = body(call)?;
    let output = if call.is_query() {
        ledgers
            .inspect(ledger_id, |ledger, now| call.query(ledger, now))
            .await??
    } else {
        let Caller(caller) = caller?;
        ledgers
            .mutate(ledger_id, |ledger, now| call.execute(&caller, ledger, now))
            .await?
    };
    Ok(Reply(output))
}
