use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::database::models::{Journey, JourneyOp, OpType};
use crate::database::DatabaseError;
use crate::oplog::projection::{self, Fold};
use crate::oplog::{AckStatus, Caller, ClientOp, OpAck, SyncError};
use crate::store::Store;

pub const DEFAULT_PULL_LIMIT: i64 = 100;
pub const MAX_PULL_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub acks: Vec<OpAck>,
    pub latest_server_seq: i64,
}

/// Ingress for device ops, shared by the HTTP sync endpoint and the
/// WebSocket channel.
pub struct SyncService {
    store: Arc<dyn Store>,
    config: SyncConfig,
}

impl SyncService {
    pub fn new(store: Arc<dyn Store>, config: SyncConfig) -> Self {
        Self { store, config }
    }

    /// Process a batch in order, one transaction per op. Only an oversized
    /// batch fails as a whole; every other problem becomes a FAILED ack for
    /// the op that caused it.
    pub async fn sync_batch(&self, caller: &Caller, last_server_seq: i64, ops: Vec<Value>) -> Result<SyncOutcome, SyncError> {
        if ops.len() > self.config.max_batch_size {
            return Err(SyncError::BatchTooLarge {
                size: ops.len(),
                max: self.config.max_batch_size,
            });
        }

        let mut acks = Vec::with_capacity(ops.len());
        for raw in ops {
            acks.push(self.sync_one(caller, raw).await);
        }

        let latest_server_seq = acks
            .iter()
            .filter(|ack| ack.status != AckStatus::Failed)
            .filter_map(|ack| ack.server_seq)
            .max()
            .unwrap_or(last_server_seq);

        Ok(SyncOutcome {
            acks,
            latest_server_seq,
        })
    }

    pub async fn sync_one(&self, caller: &Caller, raw: Value) -> OpAck {
        let op_id = ClientOp::op_id_of(&raw);
        match self.try_sync(caller, raw).await {
            Ok(ack) => ack,
            Err(e) => {
                match &e {
                    SyncError::Database(db) => {
                        tracing::error!(op_id = ?op_id, user_id = %caller.user_id, error = %db, "Op failed to persist")
                    }
                    other => tracing::warn!(op_id = ?op_id, user_id = %caller.user_id, error = %other, "Op rejected"),
                }
                OpAck::failed(op_id, e.to_string())
            }
        }
    }

    async fn try_sync(&self, caller: &Caller, raw: Value) -> Result<OpAck, SyncError> {
        let op = ClientOp::parse(raw)?;
        let mut tx = self.store.begin().await?;

        if let Some(existing) = tx.find_op(op.op_id).await? {
            tracing::debug!(op_id = %op.op_id, server_seq = existing.server_seq, "Op already processed");
            return Ok(OpAck::already_processed(&existing));
        }

        let current = tx.journey(op.journey_id).await?;
        let owner = match (op.op_type, &current) {
            (OpType::Start, _) => caller.user_id,
            (_, Some(journey)) if journey.user_id == caller.user_id || caller.is_admin => journey.user_id,
            (_, Some(_)) => return Err(SyncError::NotOwner(op.journey_id)),
            (_, None) => return Err(SyncError::UnknownJourney(op.journey_id)),
        };
        if op.op_type == OpType::Move && !self.config.accept_move_ops {
            return Err(SyncError::MoveDisabled);
        }

        let op_id = op.op_id;
        let Some(sequenced) = tx.insert_op(&op.into_new(owner)).await? else {
            // Lost a race with a concurrent insert of the same op id
            drop(tx);
            return self.find_committed(op_id).await;
        };

        let journey = projection::apply(current, &sequenced)?;
        if sequenced.op_type == OpType::Start {
            // A concurrent START for the same journey loses on the primary key
            tx.insert_journey(&journey).await.map_err(|err| match err {
                DatabaseError::UniqueViolation(_) => SyncError::JourneyExists(journey.id),
                other => SyncError::Database(other),
            })?;
        } else {
            tx.save_journey(&journey).await?;
        }
        tx.commit().await?;

        tracing::info!(
            op_id = %sequenced.op_id,
            server_seq = sequenced.server_seq,
            journey_id = %sequenced.journey_id,
            op_type = %sequenced.op_type,
            "Op accepted"
        );
        Ok(OpAck::ok(&sequenced))
    }

    async fn find_committed(&self, op_id: Uuid) -> Result<OpAck, SyncError> {
        let mut tx = self.store.read().await?;
        tx.find_op(op_id)
            .await?
            .map(|op| OpAck::already_processed(&op))
            .ok_or_else(|| SyncError::Database(DatabaseError::Corrupt(format!("op {} vanished after conflict", op_id))))
    }

    /// Ops with `server_seq > after`, oldest first. Non-admin callers only
    /// see their own.
    pub async fn ops_after(&self, caller: &Caller, after: i64, limit: Option<i64>) -> Result<Vec<JourneyOp>, SyncError> {
        let limit = limit.unwrap_or(DEFAULT_PULL_LIMIT).clamp(1, MAX_PULL_LIMIT);
        let owner = if caller.is_admin { None } else { Some(caller.user_id) };
        let mut tx = self.store.read().await?;
        Ok(tx.ops_after(after.max(0), owner, limit).await?)
    }

    pub async fn journey(&self, caller: &Caller, id: Uuid) -> Result<Option<Journey>, SyncError> {
        let mut tx = self.store.read().await?;
        let journey = tx.journey(id).await?;
        Ok(journey.filter(|j| caller.is_admin || j.user_id == caller.user_id))
    }

    /// Drop the projection and refold it from the whole log in one
    /// transaction. Returns the number of journeys written.
    pub async fn rebuild_journeys(&self) -> Result<usize, SyncError> {
        let mut tx = self.store.begin().await?;
        let ops = tx.all_ops().await?;
        let cleared = tx.clear_journeys().await?;

        let Fold { journeys, skipped } = projection::fold(&ops);
        for journey in &journeys {
            tx.save_journey(journey).await?;
        }
        tx.commit().await?;

        tracing::info!(
            ops = ops.len(),
            cleared,
            journeys = journeys.len(),
            skipped = skipped.len(),
            "Journey projection rebuilt"
        );
        Ok(journeys.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::JourneyStatus;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn service(accept_move_ops: bool) -> SyncService {
        SyncService::new(
            Arc::new(MemoryStore::new()),
            SyncConfig {
                max_batch_size: 10,
                accept_move_ops,
            },
        )
    }

    fn caller() -> Caller {
        Caller {
            user_id: Uuid::new_v4(),
            is_admin: false,
        }
    }

    fn raw(op_id: Uuid, journey_id: Uuid, op_type: &str, payload: Value) -> Value {
        json!({"opId": op_id, "journeyId": journey_id, "type": op_type, "payload": payload, "localSeq": 1})
    }

    #[tokio::test]
    async fn replayed_op_keeps_its_sequence() {
        let service = service(true);
        let who = caller();
        let op_id = Uuid::new_v4();
        let journey_id = Uuid::new_v4();

        let first = service.sync_one(&who, raw(op_id, journey_id, "START", json!({"destinationAddress": "A"}))).await;
        let second = service.sync_one(&who, raw(op_id, journey_id, "START", json!({"destinationAddress": "B"}))).await;

        assert_eq!(first.status, AckStatus::Ok);
        assert_eq!(second.status, AckStatus::AlreadyProcessed);
        assert_eq!(first.server_seq, second.server_seq);

        let journey = service.journey(&who, journey_id).await.unwrap().unwrap();
        assert_eq!(journey.destination_address.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn malformed_op_fails_alone() {
        let service = service(true);
        let who = caller();
        let journey_id = Uuid::new_v4();

        let outcome = service
            .sync_batch(
                &who,
                0,
                vec![
                    raw(Uuid::new_v4(), journey_id, "START", json!({})),
                    json!({"opId": Uuid::new_v4(), "type": "TELEPORT"}),
                    raw(Uuid::new_v4(), journey_id, "STOP", json!({"distance": 2500.0})),
                ],
            )
            .await
            .unwrap();

        let statuses: Vec<AckStatus> = outcome.acks.iter().map(|a| a.status).collect();
        assert_eq!(statuses, vec![AckStatus::Ok, AckStatus::Failed, AckStatus::Ok]);
        assert_eq!(outcome.latest_server_seq, outcome.acks[2].server_seq.unwrap());

        let journey = service.journey(&who, journey_id).await.unwrap().unwrap();
        assert_eq!(journey.status, JourneyStatus::Completed);
    }

    #[tokio::test]
    async fn foreign_journeys_and_disabled_moves_fail() {
        let service = service(false);
        let owner = caller();
        let intruder = caller();
        let journey_id = Uuid::new_v4();

        service.sync_one(&owner, raw(Uuid::new_v4(), journey_id, "START", json!({}))).await;

        let stop = service.sync_one(&intruder, raw(Uuid::new_v4(), journey_id, "STOP", json!({}))).await;
        assert_eq!(stop.status, AckStatus::Failed);

        let moved = service
            .sync_one(&owner, raw(Uuid::new_v4(), journey_id, "MOVE", json!({"latitude": 1.0, "longitude": 2.0})))
            .await;
        assert_eq!(moved.status, AckStatus::Failed);
        assert!(service.journey(&intruder, journey_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected() {
        let service = service(true);
        let ops = (0..11).map(|_| json!({})).collect();
        assert!(matches!(
            service.sync_batch(&caller(), 0, ops).await,
            Err(SyncError::BatchTooLarge { size: 11, max: 10 })
        ));
    }

    #[tokio::test]
    async fn rebuild_reproduces_incremental_projection() {
        let service = service(true);
        let who = caller();
        let journey_id = Uuid::new_v4();
        service.sync_one(&who, raw(Uuid::new_v4(), journey_id, "START", json!({}))).await;
        service.sync_one(&who, raw(Uuid::new_v4(), journey_id, "STOP", json!({"distance": 1234.5678}))).await;
        let before = service.journey(&who, journey_id).await.unwrap().unwrap();

        assert_eq!(service.rebuild_journeys().await.unwrap(), 1);
        let after = service.journey(&who, journey_id).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn competing_starts_leave_one_journey() {
        let service = service(true);
        let who = caller();
        let journey_id = Uuid::new_v4();

        let (a, b) = tokio::join!(
            service.sync_one(&who, raw(Uuid::new_v4(), journey_id, "START", json!({"destinationAddress": "A"}))),
            service.sync_one(&who, raw(Uuid::new_v4(), journey_id, "START", json!({"destinationAddress": "B"}))),
        );
        let mut statuses = vec![a.status, b.status];
        statuses.sort_by_key(|s| *s == AckStatus::Failed);
        assert_eq!(statuses, vec![AckStatus::Ok, AckStatus::Failed]);

        service.sync_one(&who, raw(Uuid::new_v4(), journey_id, "STOP", json!({"distance": 100.0}))).await;
        let restart = service.sync_one(&who, raw(Uuid::new_v4(), journey_id, "START", json!({}))).await;
        assert_eq!(restart.status, AckStatus::Failed);

        let journey = service.journey(&who, journey_id).await.unwrap().unwrap();
        assert_eq!(journey.status, JourneyStatus::Completed);
    }
}
