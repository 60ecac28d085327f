use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rocket::tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::error::{Error, Result};
use crate::model::{
    address::Address,
    clock::Clock,
    ledger::{Ledger, LedgerConfig},
};

/// Ledger IDs are dense indices, starting from 0.
pub type LedgerId = u32;

/// Every ledger hosted by this server, each behind its own lock.
///
/// Mutations hold the write lock of a single ledger for their whole
/// validate-then-commit sequence, so calls against one ledger are applied
/// one at a time while different ledgers proceed independently. The clock
/// is read only after the lock is held, so commit times are monotonic
/// within a ledger.
pub struct Ledgers {
    clock: Arc<dyn Clock>,
    max_ledgers: u32,
    ledgers: RwLock<Vec<Arc<RwLock<Ledger>>>>,
}

impl Ledgers {
    pub fn new(clock: Arc<dyn Clock>, max_ledgers: u32) -> Self {
        Self {
            clock,
            max_ledgers,
            ledgers: RwLock::new(Vec::new()),
        }
    }

    /// The current time according to the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create a ledger owned by `owner` whose window opens now.
    pub async fn create(&self, owner: Address, duration_seconds: u64) -> Result<LedgerId> {
        let mut ledgers = self.ledgers.write().await;
        if ledgers.len() >= self.max_ledgers as usize {
            return Err(Error::bad_request(format!(
                "This server hosts at most {} ledgers",
                self.max_ledgers
            )));
        }
        let id = LedgerId::try_from(ledgers.len()).map_err(|_| Error::Overflow("ledger count"))?;

        let config = LedgerConfig {
            owner,
            duration_seconds,
        };
        info!(
            "Ledger {id} created by {} with a {duration_seconds}s voting window",
            config.owner
        );
        ledgers.push(Arc::new(RwLock::new(Ledger::new(config, self.now()))));
        Ok(id)
    }

    /// Number of ledgers hosted so far. IDs `0..len` are all valid.
    pub async fn len(&self) -> usize {
        self.ledgers.read().await.len()
    }

    /// Shared access to one ledger.
    pub async fn read(&self, id: LedgerId) -> Result<OwnedRwLockReadGuard<Ledger>> {
        Ok(self.get(id).await?.read_owned().await)
    }

    /// Exclusive access to one ledger.
    pub async fn write(&self, id: LedgerId) -> Result<OwnedRwLockWriteGuard<Ledger>> {
        Ok(self.get(id).await?.write_owned().await)
    }

    /// Run a read-only operation against a consistent snapshot of a ledger.
    pub async fn inspect<T>(
        &self,
        id: LedgerId,
        op: impl FnOnce(&Ledger, DateTime<Utc>) -> T,
    ) -> Result<T> {
        let ledger = self.read(id).await?;
        Ok(op(&ledger, self.now()))
    }

    /// Run a mutating operation with exclusive access to a ledger.
    pub async fn mutate<T>(
        &self,
        id: LedgerId,
        op: impl FnOnce(&mut Ledger, DateTime<Utc>) -> Result<T>,
    ) -> Result<T> {
        let mut ledger = self.write(id).await?;
        let result = op(&mut ledger, self.now());
        if let Err(ref e) = result {
            debug!("Ledger {id} rejected a call: {e}");
        }
        result
    }

    async fn get(&self, id: LedgerId) -> Result<Arc<RwLock<Ledger>>> {
        self.ledgers
            .read()
            .await
            .get(id as usize)
            .cloned()
            .ok_or(Error::UnknownLedger(id))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::model::{clock::ManualClock, ledger::examples::example_start};

    use super::*;

    fn registry(max_ledgers: u32) -> (Arc<Ledgers>, ManualClock) {
        let clock = ManualClock::new(example_start());
        let ledgers = Ledgers::new(Arc::new(clock.clone()), max_ledgers);
        (Arc::new(ledgers), clock)
    }

    #[rocket::async_test]
    async fn ids_are_dense_and_bounded() {
        let (ledgers, _) = registry(2);
        let owner = Address::owner_example();

        assert_eq!(ledgers.create(owner.clone(), 60).await, Ok(0));
        assert_eq!(ledgers.create(owner.clone(), 60).await, Ok(1));
        assert!(matches!(
            ledgers.create(owner, 60).await,
            Err(Error::BadRequest(_))
        ));
        assert_eq!(ledgers.len().await, 2);
    }

    #[rocket::async_test]
    async fn unknown_ledgers_are_reported() {
        let (ledgers, _) = registry(4);
        assert!(matches!(
            ledgers.read(3).await,
            Err(Error::UnknownLedger(3))
        ));
        assert_eq!(
            ledgers.inspect(3, |l, _| l.balance()).await,
            Err(Error::UnknownLedger(3))
        );
    }

    #[rocket::async_test]
    async fn window_follows_the_injected_clock() {
        let (ledgers, clock) = registry(4);
        let owner = Address::owner_example();
        let id = ledgers.create(owner.clone(), 3600).await.unwrap();
        ledgers
            .mutate(id, |l, now| l.add_candidate(&owner, "Alice", now))
            .await
            .unwrap();

        clock.advance(Duration::seconds(3599));
        ledgers
            .mutate(id, |l, now| l.vote(&Address::voter_example(0), 0, now))
            .await
            .unwrap();

        clock.advance(Duration::seconds(1));
        assert!(matches!(
            ledgers
                .mutate(id, |l, now| l.vote(&Address::voter_example(1), 0, now))
                .await,
            Err(Error::VotingClosed { .. })
        ));
        assert_eq!(ledgers.read(id).await.unwrap().total_votes(), 1);
    }

    #[rocket::async_test]
    async fn concurrent_votes_are_counted_once() {
        let (ledgers, _) = registry(4);
        let owner = Address::owner_example();
        let id = ledgers.create(owner.clone(), 3600).await.unwrap();
        ledgers
            .mutate(id, |l, now| l.add_candidate(&owner, "Alice", now))
            .await
            .unwrap();

        // Every voter tries three times, all at once.
        let mut tasks = Vec::new();
        for _ in 0..3 {
            for n in 0..40 {
                let ledgers = Arc::clone(&ledgers);
                tasks.push(rocket::tokio::spawn(async move {
                    let voter = Address::voter_example(n);
                    ledgers.mutate(id, |l, now| l.vote(&voter, 0, now)).await
                }));
            }
        }
        let mut accepted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => accepted += 1,
                Err(e) => assert!(matches!(e, Error::AlreadyVoted(_))),
            }
        }

        assert_eq!(accepted, 40);
        let ledger = ledgers.read(id).await.unwrap();
        assert_eq!(ledger.candidate(0).unwrap().vote_count, 40);
        assert_eq!(ledger.dump().audit(), Ok(()));
    }

    #[rocket::async_test]
    async fn ledgers_are_isolated() {
        let (ledgers, _) = registry(4);
        let first = ledgers.create(Address::owner_example(), 60).await.unwrap();
        let second = ledgers.create(Address::voter_example(0), 60).await.unwrap();

        ledgers
            .mutate(first, |l, now| l.deposit(&Address::voter_example(1), 10, now))
            .await
            .unwrap();

        assert_eq!(ledgers.inspect(first, |l, _| l.balance()).await, Ok(10));
        assert_eq!(ledgers.inspect(second, |l, _| l.balance()).await, Ok(0));
        // Only the second ledger's owner may withdraw from it.
        assert_eq!(
            ledgers
                .mutate(second, |l, now| l.withdraw(&Address::owner_example(), 0, now))
                .await,
            Err(Error::Unauthorized(Address::owner_example()))
        );
    }
}
