// In crates/core-types/src/error.rs

use crate::types::{PositionId, Symbol};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// The specific reason an order or modification was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RejectReason {
    InvalidQuantity,
    InvalidLeverage,
    InvalidPriceLevel,
    InvalidProtectiveLevel,
    InsufficientMargin,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidQuantity => write!(f, "InvalidQuantity"),
            RejectReason::InvalidLeverage => write!(f, "InvalidLeverage"),
            RejectReason::InvalidPriceLevel => write!(f, "InvalidPriceLevel"),
            RejectReason::InvalidProtectiveLevel => write!(f, "InvalidProtectiveLevel"),
            RejectReason::InsufficientMargin => write!(f, "InsufficientMargin"),
        }
    }
}

/// Every failure a session command can return. All of them are values the
/// caller renders; none unwinds past the command boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("order rejected ({reason}): {detail}")]
    Validation { reason: RejectReason, detail: String },

    #[error("insufficient margin: required {required}, available {available}")]
    InsufficientMargin { required: Decimal, available: Decimal },

    #[error("position or order {0} not found")]
    NotFound(PositionId),

    #[error("unknown instrument: {0}")]
    UnknownInstrument(Symbol),

    #[error("no quote available for {0}")]
    QuoteUnavailable(Symbol),

    #[error("quote window out of range: {0}")]
    WindowOutOfRange(String),

    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),
}

impl Error {
    pub fn validation(reason: RejectReason, detail: impl Into<String>) -> Self {
        Error::Validation {
            reason,
            detail: detail.into(),
        }
    }

    /// The rejection reason for validation and margin failures.
    pub fn reason(&self) -> Option<RejectReason> {
        match self {
            Error::Validation { reason, .. } => Some(*reason),
            Error::InsufficientMargin { .. } => Some(RejectReason::InsufficientMargin),
            _ => None,
        }
    }

    /// Whether the user can fix the request and try again.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::InvariantViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reason_covers_margin_rejections() {
        let err = Error::InsufficientMargin {
            required: dec!(500),
            available: dec!(100),
        };
        assert_eq!(err.reason(), Some(RejectReason::InsufficientMargin));
        assert!(err.is_recoverable());

        let err = Error::validation(RejectReason::InvalidQuantity, "quantity must be positive");
        assert_eq!(err.reason(), Some(RejectReason::InvalidQuantity));
        assert_eq!(
            err.to_string(),
            "order rejected (InvalidQuantity): quantity must be positive"
        );

        assert_eq!(Error::NotFound(PositionId(3)).reason(), None);
        assert!(!Error::InvariantViolation("boom".into()).is_recoverable());
    }
}
