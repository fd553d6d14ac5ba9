use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

/// Immutable signed point delta. Rows are only ever inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Uuid,
    pub mason_id: Uuid,
    pub source_type: LedgerSource,
    pub source_id: Option<Uuid>,
    pub points: i64,
    pub memo: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        mason_id: Uuid,
        source_type: LedgerSource,
        source_id: Option<Uuid>,
        points: i64,
        memo: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mason_id,
            source_type,
            source_id,
            points,
            memo: Some(memo.into()),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerSource {
    BagLift,
    Redemption,
    Adjustment,
    JoiningBonus,
    ReferralBonus,
    ExtraBonus,
}

impl LedgerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerSource::BagLift => "bag_lift",
            LedgerSource::Redemption => "redemption",
            LedgerSource::Adjustment => "adjustment",
            LedgerSource::JoiningBonus => "joining_bonus",
            LedgerSource::ReferralBonus => "referral_bonus",
            LedgerSource::ExtraBonus => "extra_bonus",
        }
    }
}

impl FromStr for LedgerSource {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bag_lift" => Ok(LedgerSource::BagLift),
            "redemption" => Ok(LedgerSource::Redemption),
            "adjustment" => Ok(LedgerSource::Adjustment),
            "joining_bonus" => Ok(LedgerSource::JoiningBonus),
            "referral_bonus" => Ok(LedgerSource::ReferralBonus),
            "extra_bonus" => Ok(LedgerSource::ExtraBonus),
            other => Err(UnknownVariant::new("ledger source", other)),
        }
    }
}

impl fmt::Display for LedgerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
