//! Shared types, config, and error definitions for the ozon-bot.

pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::BotConfig;
pub use error::{error_chain, Error};
pub use source::{
    LedgerSource, OrderSource, ProductCatalog, UnitEconomicsLookup, UnitEconomicsTable,
};
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
