pub mod availability;
pub mod ledger;
pub mod lifecycle;
