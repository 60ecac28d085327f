pub mod address;
pub mod api;
pub mod clock;
pub mod ledger;
pub mod registry;
