use std::sync::Arc;

use log::{error, info};
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{address::Address, clock::Clock, registry::Ledgers};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    bootstrap_owner: Option<Address>,
    #[serde(default = "default_bootstrap_duration")]
    bootstrap_duration: u64,
    #[serde(default = "default_max_ledgers")]
    max_ledgers: u32,
}

fn default_bootstrap_duration() -> u64 {
    3600
}

fn default_max_ledgers() -> u32 {
    1024
}

impl Config {
    /// Owner of the ledger created at launch, if any.
    pub fn bootstrap_owner(&self) -> Option<&Address> {
        self.bootstrap_owner.as_ref()
    }

    /// Voting window of the ledger created at launch, in seconds.
    pub fn bootstrap_duration(&self) -> u64 {
        self.bootstrap_duration
    }

    /// Upper bound on the number of ledgers this server will host.
    pub fn max_ledgers(&self) -> u32 {
        self.max_ledgers
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with [`LedgerFairing`] and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// A fairing that builds the ledger registry around the given clock,
/// deploys the bootstrap ledger if one is configured, and places the
/// registry into managed state. Must be attached after [`ConfigFairing`].
pub struct LedgerFairing {
    clock: Arc<dyn Clock>,
}

impl LedgerFairing {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[rocket::async_trait]
impl Fairing for LedgerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Ledgers",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.state::<Config>() {
            Some(config) => config.clone(),
            None => {
                error!("Ledger registry needs the application config to be loaded first");
                return Err(rocket);
            }
        };
        let ledgers = Ledgers::new(Arc::clone(&self.clock), config.max_ledgers());

        if let Some(owner) = config.bootstrap_owner() {
            info!("Deploying bootstrap ledger for {owner}...");
            if let Err(e) = ledgers
                .create(owner.clone(), config.bootstrap_duration())
                .await
            {
                error!("Failed to deploy bootstrap ledger: {e}");
                return Err(rocket);
            }
            info!("...bootstrap ledger online!");
        }

        Ok(rocket.manage(ledgers))
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::Figment;

    use super::*;

    #[test]
    fn defaults_apply() {
        let config: Config = Figment::new().extract().unwrap();
        assert_eq!(
            config,
            Config {
                bootstrap_owner: None,
                bootstrap_duration: 3600,
                max_ledgers: 1024,
            }
        );
    }

    #[test]
    fn bootstrap_owner_is_validated() {
        let config: Config = Figment::new()
            .merge(("bootstrap_owner", "0xF39Fd6e51aad88F6F4ce6aB8827279cffFb92266"))
            .merge(("max_ledgers", 2))
            .extract()
            .unwrap();
        assert_eq!(config.bootstrap_owner(), Some(&Address::owner_example()));
        assert_eq!(config.max_ledgers(), 2);

        let bad = Figment::new()
            .merge(("bootstrap_owner", "not an address"))
            .extract::<Config>();
        assert!(bad.is_err());
    }
}
