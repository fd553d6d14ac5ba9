use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::KycStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycSubmission {
    pub id: Uuid,
    pub mason_id: Uuid,
    pub status: KycStatus,
    pub remark: Option<String>,
    pub documents: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KycSubmission {
    pub fn pending(mason_id: Uuid, documents: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            mason_id,
            status: KycStatus::Pending,
            remark: None,
            documents,
            created_at: now,
            updated_at: now,
        }
    }
}
