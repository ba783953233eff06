//! # Hedgebook Core
//!
//! P&L engine for physical cargo trades and the hedge positions placed
//! against them.
//!
//! The crate is a set of pure functions over caller-owned collections:
//! realized P&L, price table normalization and lookup, and mark-to-market
//! valuation of positions still open on a given date. The [`book`] module
//! adds the record lifecycle (buy, sell, close hedge) with the validation
//! rules the trading desk applies, but never owns session state itself.

pub mod book;
pub mod catalog;
pub mod error;
pub mod models;
pub mod mtm;
pub mod pnl;
pub mod prices;

pub use book::*;
pub use error::*;
pub use models::*;
pub use mtm::{evaluate, series, MtmPoint, MtmPosition, MtmSnapshot, PositionKind, PositionStatus};
pub use pnl::*;
pub use prices::{instrument_key, normalize, PriceEntry, PriceTable, RawPriceTable};
