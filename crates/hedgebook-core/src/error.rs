//! Error types for Hedgebook Core

use chrono::NaiveDate;
use thiserror::Error;

/// Raised when a raw price table header cannot be mapped onto the
/// required canonical columns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Missing required price column(s): {}", .missing.join(", "))]
pub struct MissingColumnError {
    /// Canonical names (`date`, `instrument`, `price`) that had no match.
    pub missing: Vec<&'static str>,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HedgebookError {
    #[error(transparent)]
    MissingColumn(#[from] MissingColumnError),

    #[error("Quantity must be non-zero")]
    ZeroQuantity,

    #[error("Purchase start date {start} is after end date {end}")]
    InvalidPurchaseWindow { start: NaiveDate, end: NaiveDate },

    #[error("Purchase date {date} is outside the purchase window {start} to {end}")]
    OutsidePurchaseWindow {
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("Physical trade not found: ID {0}")]
    TradeNotFound(usize),

    #[error("Physical trade ID {0} is already completed")]
    TradeAlreadyCompleted(usize),

    #[error("Hedge position not found: ID {0}")]
    HedgeNotFound(usize),

    #[error("Hedge position ID {0} is already closed")]
    HedgeAlreadyClosed(usize),

    #[error("A sale price or premium/discount is required to complete a physical trade")]
    MissingSalePrice,

    #[error("A hedge position was selected but no exit price was entered")]
    MissingExitPrice,

    #[error("Nothing to do: select a physical trade to complete or a hedge position to close")]
    EmptyOperation,

    #[error("Trade book is full ({0} records)")]
    BookFull(usize),
}

pub type HedgebookResult<T> = Result<T, HedgebookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message_names_fields() {
        let err = MissingColumnError {
            missing: vec!["date", "price"],
        };
        assert_eq!(
            err.to_string(),
            "Missing required price column(s): date, price"
        );

        let wrapped: HedgebookError = err.into();
        assert!(wrapped.to_string().contains("date, price"));
    }
}
