use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BagLift {
    pub id: Uuid,
    pub mason_id: Uuid,
    pub dealer_id: Option<Uuid>,
    pub bag_count: i64,
    /// Fixed when the lift is claimed; approval credits exactly this.
    pub points_credited: i64,
    pub status: BagLiftStatus,
    pub lifted_at: DateTime<Utc>,
    pub site_id: Option<Uuid>,
    pub site_key_person_name: Option<String>,
    pub site_key_person_phone: Option<String>,
    pub verification_site_image_url: Option<String>,
    pub verification_proof_image_url: Option<String>,
    pub memo: Option<String>,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BagLift {
    pub fn pending(mason_id: Uuid, bag_count: i64, points_credited: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            mason_id,
            dealer_id: None,
            bag_count,
            points_credited,
            status: BagLiftStatus::Pending,
            lifted_at: now,
            site_id: None,
            site_key_person_name: None,
            site_key_person_phone: None,
            verification_site_image_url: None,
            verification_proof_image_url: None,
            memo: None,
            approved_by: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BagLiftStatus {
    Pending,
    Approved,
    Rejected,
}

impl BagLiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BagLiftStatus::Pending => "pending",
            BagLiftStatus::Approved => "approved",
            BagLiftStatus::Rejected => "rejected",
        }
    }
}

impl FromStr for BagLiftStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BagLiftStatus::Pending),
            "approved" => Ok(BagLiftStatus::Approved),
            "rejected" => Ok(BagLiftStatus::Rejected),
            other => Err(UnknownVariant::new("bag lift status", other)),
        }
    }
}

impl fmt::Display for BagLiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
