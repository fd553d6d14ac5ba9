//! Journey read model as a fold over the op log.
//!
//! [`apply`] is the single step used both when an op is first accepted and
//! when the projection is rebuilt, so the two paths cannot disagree.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use uuid::Uuid;

use super::{MovePayload, StartPayload, StopPayload, SyncError};
use crate::database::models::{Journey, JourneyOp, JourneyStatus, OpType};

/// Apply one sequenced op to the journey it references.
pub fn apply(current: Option<Journey>, op: &JourneyOp) -> Result<Journey, SyncError> {
    match (op.op_type, current) {
        (OpType::Start, Some(_)) => Err(SyncError::JourneyExists(op.journey_id)),
        (OpType::Start, None) => {
            let start = StartPayload::from_value(&op.payload)?;
            Ok(Journey {
                id: op.journey_id,
                user_id: op.user_id,
                status: JourneyStatus::Active,
                start_time: start.start_time.unwrap_or(op.created_at),
                end_time: None,
                total_distance: None,
                site_id: start.site_id,
                dealer_id: start.dealer_id,
                destination_address: start.destination_address,
                destination_latitude: start.destination_latitude,
                destination_longitude: start.destination_longitude,
                last_server_seq: op.server_seq,
            })
        }
        (_, None) => Err(SyncError::UnknownJourney(op.journey_id)),
        (_, Some(journey)) if journey.status == JourneyStatus::Completed => {
            Err(SyncError::JourneyCompleted(journey.id))
        }
        (OpType::Move, Some(mut journey)) => {
            MovePayload::from_value(&op.payload)?;
            journey.last_server_seq = op.server_seq;
            Ok(journey)
        }
        (OpType::Stop, Some(mut journey)) => {
            let stop = StopPayload::from_value(&op.payload)?;
            journey.status = JourneyStatus::Completed;
            journey.end_time = Some(stop.end_time.unwrap_or(op.created_at));
            journey.total_distance = stop.distance.map(meters_to_km).transpose()?;
            journey.last_server_seq = op.server_seq;
            Ok(journey)
        }
    }
}

/// Convert a device-reported distance in meters to kilometers with three
/// decimal places, halves rounded away from zero.
pub fn meters_to_km(meters: f64) -> Result<Decimal, SyncError> {
    let meters = Decimal::from_f64(meters)
        .ok_or_else(|| SyncError::InvalidOp(format!("distance {} is not representable", meters)))?;
    Ok((meters / Decimal::ONE_THOUSAND).round_dp_with_strategy(3, RoundingStrategy::MidpointAwayFromZero))
}

/// Outcome of replaying the whole log
#[derive(Debug, Default)]
pub struct Fold {
    pub journeys: Vec<Journey>,
    /// Ops that could not be applied; they stay in the log untouched
    pub skipped: Vec<i64>,
}

/// Replay ops in `server_seq` order into a fresh projection.
pub fn fold(ops: &[JourneyOp]) -> Fold {
    let mut ordered: Vec<&JourneyOp> = ops.iter().collect();
    ordered.sort_by_key(|op| op.server_seq);

    let mut journeys: HashMap<Uuid, Journey> = HashMap::new();
    let mut order: Vec<Uuid> = Vec::new();
    let mut skipped = Vec::new();

    for op in ordered {
        let current = journeys.get(&op.journey_id).cloned();
        match apply(current, op) {
            Ok(journey) => {
                if !journeys.contains_key(&journey.id) {
                    order.push(journey.id);
                }
                journeys.insert(journey.id, journey);
            }
            Err(e) => {
                tracing::warn!(server_seq = op.server_seq, op_id = %op.op_id, error = %e, "Skipping op during replay");
                skipped.push(op.server_seq);
            }
        }
    }

    Fold {
        journeys: order.into_iter().filter_map(|id| journeys.remove(&id)).collect(),
        skipped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::str::FromStr;

    fn op(seq: i64, journey: Uuid, op_type: OpType, payload: Value) -> JourneyOp {
        JourneyOp {
            server_seq: seq,
            op_id: Uuid::new_v4(),
            journey_id: journey,
            user_id: Uuid::nil(),
            op_type,
            payload,
            local_seq: Some(seq),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn distance_is_kilometers_to_three_places() {
        assert_eq!(meters_to_km(12345.0).unwrap(), Decimal::from_str("12.345").unwrap());
        assert_eq!(meters_to_km(1500.5).unwrap(), Decimal::from_str("1.501").unwrap());
        assert_eq!(meters_to_km(0.0).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn start_move_stop_completes_journey() {
        let id = Uuid::new_v4();
        let started = apply(None, &op(1, id, OpType::Start, json!({"destinationAddress": "Depot"}))).unwrap();
        assert_eq!(started.status, JourneyStatus::Active);

        let moved = apply(Some(started), &op(2, id, OpType::Move, json!({"latitude": 12.9, "longitude": 77.6}))).unwrap();
        assert_eq!(moved.last_server_seq, 2);

        let stopped = apply(Some(moved), &op(3, id, OpType::Stop, json!({"distance": 4200.0}))).unwrap();
        assert_eq!(stopped.status, JourneyStatus::Completed);
        assert_eq!(stopped.total_distance, Some(Decimal::from_str("4.2").unwrap()));
        assert!(stopped.end_time.is_some());
    }

    #[test]
    fn lifecycle_violations_fail() {
        let id = Uuid::new_v4();
        assert!(matches!(
            apply(None, &op(1, id, OpType::Stop, json!({}))),
            Err(SyncError::UnknownJourney(_))
        ));

        let started = apply(None, &op(1, id, OpType::Start, json!({}))).unwrap();
        assert!(matches!(
            apply(Some(started.clone()), &op(2, id, OpType::Start, json!({}))),
            Err(SyncError::JourneyExists(_))
        ));

        let stopped = apply(Some(started), &op(3, id, OpType::Stop, json!({}))).unwrap();
        assert!(matches!(
            apply(Some(stopped), &op(4, id, OpType::Move, json!({"latitude": 1.0, "longitude": 1.0}))),
            Err(SyncError::JourneyCompleted(_))
        ));
    }

    #[test]
    fn fold_matches_incremental_and_ignores_input_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ops = vec![
            op(4, a, OpType::Stop, json!({"distance": 900.0})),
            op(1, a, OpType::Start, json!({})),
            op(2, b, OpType::Start, json!({})),
            op(3, b, OpType::Start, json!({})),
        ];

        let result = fold(&ops);
        assert_eq!(result.journeys.len(), 2);
        assert_eq!(result.skipped, vec![3]);

        let first = apply(None, &ops[1]).unwrap();
        let incremental = apply(Some(first), &ops[0]).unwrap();
        assert_eq!(result.journeys[0], incremental);
    }
}
