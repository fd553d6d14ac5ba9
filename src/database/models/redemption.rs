use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardRedemption {
    pub id: Uuid,
    pub mason_id: Uuid,
    pub reward_id: Uuid,
    pub quantity: i64,
    /// Debited from the ledger at placement time.
    pub points_debited: i64,
    pub status: RedemptionStatus,
    pub fulfillment_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedemptionStatus {
    Placed,
    Approved,
    Shipped,
    Delivered,
    Rejected,
}

impl RedemptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionStatus::Placed => "placed",
            RedemptionStatus::Approved => "approved",
            RedemptionStatus::Shipped => "shipped",
            RedemptionStatus::Delivered => "delivered",
            RedemptionStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RedemptionStatus::Delivered | RedemptionStatus::Rejected)
    }
}

impl FromStr for RedemptionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(RedemptionStatus::Placed),
            "approved" => Ok(RedemptionStatus::Approved),
            "shipped" => Ok(RedemptionStatus::Shipped),
            "delivered" => Ok(RedemptionStatus::Delivered),
            "rejected" => Ok(RedemptionStatus::Rejected),
            other => Err(UnknownVariant::new("redemption status", other)),
        }
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
