//! 应用层

pub mod account_store;
pub mod single_flight;

pub use account_store::{AccountStore, DefaultAccountStore};
pub use single_flight::SingleFlight;
