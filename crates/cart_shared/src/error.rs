use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{OptionId, Quantity};

/// Every failure a save can surface to the person editing the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Parse,
    Bounds,
    Transport,
    ServerRejection,
}

/// The subset of [`ErrorKind`] that can come back from a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    ServerRejection,
}

impl From<FailureKind> for ErrorKind {
    fn from(value: FailureKind) -> Self {
        match value {
            FailureKind::Transport => ErrorKind::Transport,
            FailureKind::ServerRejection => ErrorKind::ServerRejection,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("quantity for option {option_id} must be a whole number of 0 or more, got {raw:?}")]
    NotANumber { option_id: OptionId, raw: String },
    #[error("quantity for option {option_id} cannot be below 0, got {quantity}")]
    BelowMinimum { option_id: OptionId, quantity: i64 },
    #[error("quantity for option {option_id} cannot exceed stock ({max_stock}), got {quantity}")]
    ExceedsStock {
        option_id: OptionId,
        quantity: i64,
        max_stock: Quantity,
    },
}

impl ValidationError {
    pub fn option_id(&self) -> &OptionId {
        match self {
            ValidationError::NotANumber { option_id, .. }
            | ValidationError::BelowMinimum { option_id, .. }
            | ValidationError::ExceedsStock { option_id, .. } => option_id,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ValidationError::NotANumber { .. } => ErrorKind::Parse,
            ValidationError::BelowMinimum { .. } | ValidationError::ExceedsStock { .. } => {
                ErrorKind::Bounds
            }
        }
    }
}
