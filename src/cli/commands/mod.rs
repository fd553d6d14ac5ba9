pub mod journeys;
pub mod ledger;
pub mod server;
pub mod token;
