use std::sync::Arc;

use rocket::{figment::Figment, Build, Rocket};

use crate::config::{ConfigFairing, LedgerFairing};
use crate::logging::LoggerFairing;
use crate::model::clock::{Clock, SystemClock};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

/// The server as deployed: configured from `Rocket.toml` and the
/// environment, running on wall-clock time.
pub fn build() -> Rocket<Build> {
    rocket_with_clock(Arc::new(SystemClock))
}

/// The server with an injected clock.
pub fn rocket_with_clock(clock: Arc<dyn Clock>) -> Rocket<Build> {
    rocket_from_figment(rocket::Config::figment(), clock)
}

/// The server with both its configuration and its clock supplied by the caller.
pub fn rocket_from_figment(figment: Figment, clock: Arc<dyn Clock>) -> Rocket<Build> {
    rocket::custom(figment)
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(LedgerFairing::new(clock))
}

/// The server used by `#[backend_test]`. With `bootstrap`, ledger 0 is
/// deployed at launch, owned by [`model::address::Address::owner_example`]
/// with a one hour window.
#[cfg(test)]
pub(crate) fn test_rocket(clock: model::clock::ManualClock, bootstrap: bool) -> Rocket<Build> {
    use model::address::Address;

    let mut figment = rocket::Config::figment();
    if bootstrap {
        figment = figment
            .merge(("bootstrap_owner", Address::owner_example()))
            .merge(("bootstrap_duration", 3600));
    }
    rocket_from_figment(figment, Arc::new(clock))
}
