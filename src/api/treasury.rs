use rocket::{get, post, routes, Route, State};

use crate::error::Result;
use crate::model::{
    api::{Caller, Funds, Reply},
    ledger::{Amount, Payout},
    registry::{LedgerId, Ledgers},
};

use super::{body, Body};

pub fn routes() -> Vec<Route> {
    routes![deposit, withdraw, balance]
}

#[post("/ledgers/<ledger_id>/treasury/deposit", data = "<funds>")]
async fn deposit(
    ledger_id: LedgerId,
    caller: Caller,
    funds: Body<'_, Funds>,
    ledgers: &State<Ledgers>,
) -> Result<Reply<()>> {
    let funds = body(funds)?;
    ledgers
        .mutate(ledger_id, |ledger, now| ledger.deposit(&caller.0, funds.amount, now))
        .await?;
    Ok(Reply(()))
}

/// Withdraw to the owner. The returned payout is what the host must transfer.
#[post("/ledgers/<ledger_id>/treasury/withdraw", data = "<funds>")]
async fn withdraw(
    ledger_id: LedgerId,
    caller: Caller,
    funds: Body<'_, Funds>,
    ledgers: &State<Ledgers>,
) -> Result<Reply<Payout>> {
    let funds = body(funds)?;
    let payout = ledgers
        .mutate(ledger_id, |ledger, now| ledger.withdraw(&caller.0, funds.amount, now))
        .await?;
    Ok(Reply(payout))
}

#[get("/ledgers/<ledger_id>/treasury/balance")]
async fn balance(ledger_id: LedgerId, ledgers: &State<Ledgers>) -> Result<Reply<Amount>> {
    let balance = ledgers.inspect(ledger_id, |ledger, _| ledger.balance()).await?;
    Ok(Reply(balance))
}

#[cfg(test)]
mod tests {
    use backend_test::backend_test;
    use chrono::Duration;
    use rocket::{
        http::Status,
        local::asynchronous::{Client, LocalResponse},
        uri,
    };

    use crate::error::ErrorKind;
    use crate::model::{address::Address, clock::ManualClock};

    use super::super::test_helpers::*;
    use super::*;

    async fn deposit_as<'c>(client: &'c Client, from: &Address, amount: Amount) -> LocalResponse<'c> {
        client
            .post(uri!(deposit(0)))
            .header(caller(from))
            .json(&Funds { amount })
            .dispatch()
            .await
    }

    async fn withdraw_as<'c>(client: &'c Client, to: &Address, amount: Amount) -> LocalResponse<'c> {
        client
            .post(uri!(withdraw(0)))
            .header(caller(to))
            .json(&Funds { amount })
            .dispatch()
            .await
    }

    async fn current_balance(client: &Client) -> Amount {
        let response = client.get(uri!(balance(0))).dispatch().await;
        envelope::<Amount>(response).await.result.unwrap()
    }

    #[backend_test(ledger)]
    async fn deposit_then_withdraw(client: Client) {
        let owner = Address::owner_example();
        let response = deposit_as(&client, &Address::voter_example(4), 100).await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(current_balance(&client).await, 100);

        let response = withdraw_as(&client, &owner, 40).await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(
            envelope::<Payout>(response).await.result,
            Some(Payout {
                to: owner,
                amount: 40
            })
        );
        assert_eq!(current_balance(&client).await, 60);
    }

    #[backend_test(ledger)]
    async fn overdraw_is_unprocessable(client: Client) {
        let owner = Address::owner_example();
        deposit_as(&client, &Address::voter_example(4), 100).await;
        withdraw_as(&client, &owner, 40).await;

        let response = withdraw_as(&client, &owner, 1000).await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let envelope = envelope::<()>(response).await;
        assert_eq!(envelope.error_kind, Some(ErrorKind::InsufficientFunds));
        assert_eq!(
            envelope.message.as_deref(),
            Some("Cannot withdraw 1000: balance is only 60")
        );
        assert_eq!(current_balance(&client).await, 60);
    }

    #[backend_test(ledger)]
    async fn strangers_cannot_withdraw(client: Client) {
        let stranger = Address::voter_example(4);
        deposit_as(&client, &stranger, 100).await;

        let response = withdraw_as(&client, &stranger, 10).await;
        assert_eq!(response.status(), Status::Unauthorized);
        assert_eq!(
            envelope::<()>(response).await.error_kind,
            Some(ErrorKind::Unauthorized)
        );
        assert_eq!(current_balance(&client).await, 100);
    }

    #[backend_test(ledger)]
    async fn overflowing_deposit_is_rejected(client: Client) {
        deposit_as(&client, &Address::voter_example(0), Amount::MAX).await;

        let response = deposit_as(&client, &Address::voter_example(1), 1).await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        assert_eq!(
            envelope::<()>(response).await.error_kind,
            Some(ErrorKind::Overflow)
        );
        assert_eq!(current_balance(&client).await, Amount::MAX);
    }

    #[backend_test(ledger)]
    async fn treasury_ignores_the_window(client: Client, clock: ManualClock) {
        clock.advance(Duration::days(1));
        deposit_as(&client, &Address::voter_example(0), 7).await;
        let response = withdraw_as(&client, &Address::owner_example(), 7).await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(current_balance(&client).await, 0);
    }
}
