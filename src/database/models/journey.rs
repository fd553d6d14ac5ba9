use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

/// An accepted, server-sequenced journey operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyOp {
    pub server_seq: i64,
    pub op_id: Uuid,
    pub journey_id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub op_type: OpType,
    pub payload: Value,
    pub local_seq: Option<i64>,
    /// Client clock at the time the op was generated.
    pub created_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

/// An op that passed validation and ownership checks, waiting for its
/// `server_seq`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJourneyOp {
    pub op_id: Uuid,
    pub journey_id: Uuid,
    pub user_id: Uuid,
    pub op_type: OpType,
    pub payload: Value,
    pub local_seq: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl NewJourneyOp {
    pub fn sequenced(self, server_seq: i64, received_at: DateTime<Utc>) -> JourneyOp {
        JourneyOp {
            server_seq,
            op_id: self.op_id,
            journey_id: self.journey_id,
            user_id: self.user_id,
            op_type: self.op_type,
            payload: self.payload,
            local_seq: self.local_seq,
            created_at: self.created_at,
            received_at,
        }
    }
}

/// Read model folded from the op log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: JourneyStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Kilometers, three decimal places.
    pub total_distance: Option<Decimal>,
    pub site_id: Option<Uuid>,
    pub dealer_id: Option<Uuid>,
    pub destination_address: Option<String>,
    pub destination_latitude: Option<f64>,
    pub destination_longitude: Option<f64>,
    pub last_server_seq: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpType {
    Start,
    Move,
    Stop,
}

impl OpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Start => "START",
            OpType::Move => "MOVE",
            OpType::Stop => "STOP",
        }
    }
}

impl FromStr for OpType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "START" => Ok(OpType::Start),
            "MOVE" => Ok(OpType::Move),
            "STOP" => Ok(OpType::Stop),
            other => Err(UnknownVariant::new("op type", other)),
        }
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JourneyStatus {
    Active,
    Completed,
}

impl JourneyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JourneyStatus::Active => "ACTIVE",
            JourneyStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for JourneyStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(JourneyStatus::Active),
            "COMPLETED" => Ok(JourneyStatus::Completed),
            other => Err(UnknownVariant::new("journey status", other)),
        }
    }
}
