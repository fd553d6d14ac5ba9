use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: Uuid,
    pub name: String,
    pub stock: i64,
    pub point_cost: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reward {
    pub fn new(name: impl Into<String>, point_cost: i64, stock: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            stock,
            point_cost,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
