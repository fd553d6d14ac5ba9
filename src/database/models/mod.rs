pub mod bag_lift;
pub mod journey;
pub mod kyc;
pub mod ledger;
pub mod mason;
pub mod redemption;
pub mod reward;

pub use bag_lift::{BagLift, BagLiftStatus};
pub use journey::{Journey, JourneyOp, JourneyStatus, NewJourneyOp, OpType};
pub use kyc::KycSubmission;
pub use ledger::{LedgerEntry, LedgerSource};
pub use mason::{KycStatus, Mason};
pub use redemption::{RedemptionStatus, RewardRedemption};
pub use reward::Reward;

/// A stored or submitted enum value that matches no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
