//! Approval state machines for bag lifts, KYC submissions and reward
//! redemptions.
//!
//! Each machine is a pure planner: given the locked record, the locked
//! account and the requested change, it returns the updated record plus the
//! [`Effect`]s the transition implies, or the reason the transition is not
//! allowed. Services run the planner inside a store transaction and apply
//! the plan; nothing here touches storage.

pub mod bag_lift;
pub mod kyc;
pub mod redemption;

use thiserror::Error;

use crate::database::DatabaseError;
use crate::ledger::Effect;

pub use bag_lift::BagLiftUpdate;
pub use kyc::{KycUpdate, MasonUpdates};
pub use redemption::RedemptionUpdate;

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{entity} is already {status}")]
    SameStatus { entity: &'static str, status: String },

    #[error("Cannot move {entity} from {from} to {to}")]
    Illegal {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    #[error("Insufficient points: required {required}, balance {balance}")]
    InsufficientPoints { required: i64, balance: i64 },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The record changed under us, or a ledger source was already credited
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl TransitionError {
    pub(crate) fn illegal(entity: &'static str, from: impl ToString, to: impl ToString) -> Self {
        TransitionError::Illegal {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Planned outcome of one approval transition
#[derive(Debug, Clone)]
pub struct Transition<T> {
    pub record: T,
    pub effects: Vec<Effect>,
    pub message: String,
}
