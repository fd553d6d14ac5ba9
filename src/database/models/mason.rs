use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

/// Loyalty account of a mason. `points_balance` and `bags_lifted` are
/// running totals maintained in the same transaction as the ledger writes
/// that justify them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mason {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub dealer_id: Option<Uuid>,
    pub referred_by: Option<Uuid>,
    pub points_balance: i64,
    pub bags_lifted: i64,
    pub kyc_status: KycStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mason {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            phone: None,
            dealer_id: None,
            referred_by: None,
            points_balance: 0,
            bags_lifted: 0,
            kyc_status: KycStatus::None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn referred_by(mut self, referrer: Uuid) -> Self {
        self.referred_by = Some(referrer);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KycStatus {
    None,
    Pending,
    Approved,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::None => "none",
            KycStatus::Pending => "pending",
            KycStatus::Approved => "approved",
            KycStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for KycStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(KycStatus::None),
            "pending" => Ok(KycStatus::Pending),
            "approved" => Ok(KycStatus::Approved),
            "rejected" => Ok(KycStatus::Rejected),
            other => Err(UnknownVariant::new("kyc status", other)),
        }
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
