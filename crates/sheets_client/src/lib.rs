//! Google Sheets client for the unit-economics ledger.
//!
//! Authenticates with a service-account key (RS256 JWT bearer grant), reads
//! the ledger worksheet in one request, and parses it into a
//! [`common::UnitEconomicsTable`].

pub mod auth;
pub mod client;
pub mod ledger;

pub use auth::{ServiceAccountAuth, ServiceAccountKey};
pub use client::SheetsClient;
pub use ledger::{parse_ledger, parse_number, LedgerColumns};
