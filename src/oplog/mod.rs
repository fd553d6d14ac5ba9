//! Client-generated journey operations.
//!
//! Ops arrive as raw JSON so one malformed op cannot fail the batch it
//! came in; each is parsed and validated on its own by [`ClientOp::parse`].

pub mod projection;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{JourneyOp, NewJourneyOp, OpType};
use crate::database::DatabaseError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid op: {0}")]
    InvalidOp(String),

    #[error("Batch of {size} ops exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("Journey {0} does not exist")]
    UnknownJourney(Uuid),

    #[error("Journey {0} already exists")]
    JourneyExists(Uuid),

    #[error("Journey {0} is already completed")]
    JourneyCompleted(Uuid),

    #[error("Journey {0} belongs to another user")]
    NotOwner(Uuid),

    #[error("MOVE ops are not accepted")]
    MoveDisabled,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// The principal an op is synced on behalf of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub is_admin: bool,
}

/// One op as sent by a device
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientOp {
    pub op_id: Uuid,
    pub journey_id: Uuid,
    #[serde(rename = "type")]
    pub op_type: OpType,
    #[serde(default)]
    pub payload: Value,
    pub local_seq: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
}

impl ClientOp {
    /// Parse and validate one op, including its type-specific payload.
    pub fn parse(raw: Value) -> Result<Self, SyncError> {
        let mut op: ClientOp = serde_json::from_value(raw).map_err(|e| SyncError::InvalidOp(e.to_string()))?;

        if op.payload.is_null() {
            op.payload = Value::Object(Default::default());
        }
        if !op.payload.is_object() {
            return Err(SyncError::InvalidOp("payload must be an object".to_string()));
        }

        // Ownership comes from the authenticated caller, never from the device
        if let Some(fields) = op.payload.as_object_mut() {
            fields.remove("userId");
        }

        match op.op_type {
            OpType::Start => StartPayload::from_value(&op.payload).map(|_| ())?,
            OpType::Move => MovePayload::from_value(&op.payload).map(|_| ())?,
            OpType::Stop => StopPayload::from_value(&op.payload).map(|_| ())?,
        }

        Ok(op)
    }

    /// Best-effort op id of a raw op, for acking ops that fail to parse.
    pub fn op_id_of(raw: &Value) -> Option<Uuid> {
        raw.get("opId")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn into_new(self, user_id: Uuid) -> NewJourneyOp {
        NewJourneyOp {
            op_id: self.op_id,
            journey_id: self.journey_id,
            user_id,
            op_type: self.op_type,
            payload: self.payload,
            local_seq: self.local_seq,
            created_at: self.created_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub start_time: Option<DateTime<Utc>>,
    pub site_id: Option<Uuid>,
    pub dealer_id: Option<Uuid>,
    pub destination_address: Option<String>,
    pub destination_latitude: Option<f64>,
    pub destination_longitude: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovePayload {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopPayload {
    pub end_time: Option<DateTime<Utc>>,
    /// Meters travelled, as measured on the device
    pub distance: Option<f64>,
}

impl StartPayload {
    pub fn from_value(value: &Value) -> Result<Self, SyncError> {
        let payload: Self = decode_payload("START", value)?;
        if let (Some(lat), Some(lng)) = (payload.destination_latitude, payload.destination_longitude) {
            check_coordinates(lat, lng)?;
        } else if payload.destination_latitude.is_some() || payload.destination_longitude.is_some() {
            return Err(SyncError::InvalidOp(
                "destinationLatitude and destinationLongitude must be sent together".to_string(),
            ));
        }
        Ok(payload)
    }
}

impl MovePayload {
    pub fn from_value(value: &Value) -> Result<Self, SyncError> {
        let payload: Self = decode_payload("MOVE", value)?;
        check_coordinates(payload.latitude, payload.longitude)?;
        Ok(payload)
    }
}

impl StopPayload {
    pub fn from_value(value: &Value) -> Result<Self, SyncError> {
        let payload: Self = decode_payload("STOP", value)?;
        if let Some(distance) = payload.distance {
            if !distance.is_finite() || distance < 0.0 {
                return Err(SyncError::InvalidOp("distance must be a non-negative number of meters".to_string()));
            }
        }
        Ok(payload)
    }
}

fn decode_payload<T: for<'de> Deserialize<'de>>(kind: &str, value: &Value) -> Result<T, SyncError> {
    T::deserialize(value).map_err(|e| SyncError::InvalidOp(format!("{} payload: {}", kind, e)))
}

fn check_coordinates(lat: f64, lng: f64) -> Result<(), SyncError> {
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(SyncError::InvalidOp(format!("coordinates out of range: {}, {}", lat, lng)));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckStatus {
    Ok,
    AlreadyProcessed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpAck {
    pub op_id: Option<Uuid>,
    pub server_seq: Option<i64>,
    pub status: AckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OpAck {
    pub fn ok(op: &JourneyOp) -> Self {
        Self {
            op_id: Some(op.op_id),
            server_seq: Some(op.server_seq),
            status: AckStatus::Ok,
            error: None,
        }
    }

    pub fn already_processed(op: &JourneyOp) -> Self {
        Self {
            op_id: Some(op.op_id),
            server_seq: Some(op.server_seq),
            status: AckStatus::AlreadyProcessed,
            error: None,
        }
    }

    pub fn failed(op_id: Option<Uuid>, error: impl Into<String>) -> Self {
        Self {
            op_id,
            server_seq: None,
            status: AckStatus::Failed,
            error: Some(error.into()),
        }
    }
}
