//! In-process store used for local development (`STORE_BACKEND=memory`)
//! and the test suites.
//!
//! Transactions are serialized behind one mutex. Each transaction works on
//! a private copy of the state and publishes it on commit, so a dropped
//! transaction leaves nothing behind. The op sequence lives outside the
//! copy and is never rolled back, which reproduces the gaps a Postgres
//! sequence leaves after aborted inserts.
//!
//! Opening a transaction, read-only ones included, deep-copies every table,
//! so each one costs O(total data) and holds the lock for its whole life.
//! Fine for tests and a laptop; run anything with real volume on Postgres.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, StoreTx};
use crate::database::models::{
    BagLift, BagLiftStatus, Journey, JourneyOp, KycStatus, KycSubmission, LedgerEntry, Mason,
    NewJourneyOp, RedemptionStatus, Reward, RewardRedemption,
};
use crate::database::DatabaseError;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    masons: HashMap<Uuid, Mason>,
    ledger: Vec<LedgerEntry>,
    rewards: HashMap<Uuid, Reward>,
    bag_lifts: HashMap<Uuid, BagLift>,
    redemptions: HashMap<Uuid, RewardRedemption>,
    kyc: HashMap<Uuid, KycSubmission>,
    ops: BTreeMap<i64, JourneyOp>,
    op_index: HashMap<Uuid, i64>,
    journeys: HashMap<Uuid, Journey>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    seq: Arc<AtomicI64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the state and take a full working copy of it.
    async fn open(&self, writable: bool) -> Box<dyn StoreTx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Box::new(MemoryTx {
            guard,
            working,
            seq: self.seq.clone(),
            writable,
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, DatabaseError> {
        Ok(self.open(true).await)
    }

    async fn read(&self) -> Result<Box<dyn StoreTx>, DatabaseError> {
        Ok(self.open(false).await)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    seq: Arc<AtomicI64>,
    writable: bool,
}

impl MemoryTx {
    fn mason_mut(&mut self, id: Uuid) -> Result<&mut Mason, DatabaseError> {
        self.working
            .masons
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::Corrupt(format!("mason {} does not exist", id)))
    }

    fn missing_fk(table: &str, id: Uuid) -> DatabaseError {
        DatabaseError::Corrupt(format!("{} {} does not exist", table, id))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_mason(&mut self, mason: &Mason) -> Result<(), DatabaseError> {
        if self.working.masons.contains_key(&mason.id) {
            return Err(DatabaseError::UniqueViolation("masons_pkey".to_string()));
        }
        self.working.masons.insert(mason.id, mason.clone());
        Ok(())
    }

    async fn mason(&mut self, id: Uuid) -> Result<Option<Mason>, DatabaseError> {
        Ok(self.working.masons.get(&id).cloned())
    }

    async fn mason_ids(&mut self) -> Result<Vec<Uuid>, DatabaseError> {
        let mut masons: Vec<&Mason> = self.working.masons.values().collect();
        masons.sort_by_key(|m| m.created_at);
        Ok(masons.into_iter().map(|m| m.id).collect())
    }

    async fn adjust_mason_totals(&mut self, id: Uuid, points_delta: i64, bags_delta: i64) -> Result<(), DatabaseError> {
        let mason = self.mason_mut(id)?;
        mason.points_balance += points_delta;
        mason.bags_lifted += bags_delta;
        mason.updated_at = Utc::now();
        Ok(())
    }

    async fn set_mason_totals(&mut self, id: Uuid, points_balance: i64, bags_lifted: i64) -> Result<(), DatabaseError> {
        let mason = self.mason_mut(id)?;
        mason.points_balance = points_balance;
        mason.bags_lifted = bags_lifted;
        mason.updated_at = Utc::now();
        Ok(())
    }

    async fn set_mason_kyc_status(&mut self, id: Uuid, status: KycStatus) -> Result<(), DatabaseError> {
        let mason = self.mason_mut(id)?;
        mason.kyc_status = status;
        mason.updated_at = Utc::now();
        Ok(())
    }

    async fn update_mason_profile(&mut self, id: Uuid, name: Option<&str>, dealer_id: Option<Uuid>) -> Result<(), DatabaseError> {
        let mason = self.mason_mut(id)?;
        if let Some(name) = name {
            mason.name = name.to_string();
        }
        if dealer_id.is_some() {
            mason.dealer_id = dealer_id;
        }
        mason.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<(), DatabaseError> {
        if !self.working.masons.contains_key(&entry.mason_id) {
            return Err(Self::missing_fk("mason", entry.mason_id));
        }
        if let Some(source_id) = entry.source_id {
            let duplicate = self.working.ledger.iter().any(|e| {
                e.mason_id == entry.mason_id
                    && e.source_type == entry.source_type
                    && e.source_id == Some(source_id)
            });
            if duplicate {
                return Err(DatabaseError::UniqueViolation("points_ledger_source_uniq".to_string()));
            }
        }
        self.working.ledger.push(entry.clone());
        Ok(())
    }

    async fn ledger_entries(&mut self, mason_id: Uuid) -> Result<Vec<LedgerEntry>, DatabaseError> {
        Ok(self
            .working
            .ledger
            .iter()
            .filter(|e| e.mason_id == mason_id)
            .cloned()
            .collect())
    }

    async fn ledger_total(&mut self, mason_id: Uuid) -> Result<i64, DatabaseError> {
        Ok(self
            .working
            .ledger
            .iter()
            .filter(|e| e.mason_id == mason_id)
            .map(|e| e.points)
            .sum())
    }

    async fn approved_bag_total(&mut self, mason_id: Uuid) -> Result<i64, DatabaseError> {
        Ok(self
            .working
            .bag_lifts
            .values()
            .filter(|l| l.mason_id == mason_id && l.status == BagLiftStatus::Approved)
            .map(|l| l.bag_count)
            .sum())
    }

    async fn insert_reward(&mut self, reward: &Reward) -> Result<(), DatabaseError> {
        if reward.stock < 0 {
            return Err(DatabaseError::Corrupt("rewards.stock must be >= 0".to_string()));
        }
        self.working.rewards.insert(reward.id, reward.clone());
        Ok(())
    }

    async fn reward(&mut self, id: Uuid) -> Result<Option<Reward>, DatabaseError> {
        Ok(self.working.rewards.get(&id).cloned())
    }

    async fn adjust_stock(&mut self, id: Uuid, delta: i64) -> Result<bool, DatabaseError> {
        let reward = self
            .working
            .rewards
            .get_mut(&id)
            .ok_or_else(|| Self::missing_fk("reward", id))?;
        if reward.stock + delta < 0 {
            return Ok(false);
        }
        reward.stock += delta;
        reward.updated_at = Utc::now();
        Ok(true)
    }

    async fn insert_bag_lift(&mut self, lift: &BagLift) -> Result<(), DatabaseError> {
        if !self.working.masons.contains_key(&lift.mason_id) {
            return Err(Self::missing_fk("mason", lift.mason_id));
        }
        self.working.bag_lifts.insert(lift.id, lift.clone());
        Ok(())
    }

    async fn bag_lift(&mut self, id: Uuid) -> Result<Option<BagLift>, DatabaseError> {
        Ok(self.working.bag_lifts.get(&id).cloned())
    }

    async fn update_bag_lift(&mut self, prior: BagLiftStatus, lift: &BagLift) -> Result<bool, DatabaseError> {
        match self.working.bag_lifts.get_mut(&lift.id) {
            Some(stored) if stored.status == prior => {
                *stored = lift.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_redemption(&mut self, redemption: &RewardRedemption) -> Result<(), DatabaseError> {
        if !self.working.masons.contains_key(&redemption.mason_id) {
            return Err(Self::missing_fk("mason", redemption.mason_id));
        }
        if !self.working.rewards.contains_key(&redemption.reward_id) {
            return Err(Self::missing_fk("reward", redemption.reward_id));
        }
        self.working.redemptions.insert(redemption.id, redemption.clone());
        Ok(())
    }

    async fn redemption(&mut self, id: Uuid) -> Result<Option<RewardRedemption>, DatabaseError> {
        Ok(self.working.redemptions.get(&id).cloned())
    }

    async fn update_redemption(&mut self, prior: RedemptionStatus, redemption: &RewardRedemption) -> Result<bool, DatabaseError> {
        match self.working.redemptions.get_mut(&redemption.id) {
            Some(stored) if stored.status == prior => {
                *stored = redemption.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_kyc(&mut self, submission: &KycSubmission) -> Result<(), DatabaseError> {
        if !self.working.masons.contains_key(&submission.mason_id) {
            return Err(Self::missing_fk("mason", submission.mason_id));
        }
        self.working.kyc.insert(submission.id, submission.clone());
        Ok(())
    }

    async fn kyc(&mut self, id: Uuid) -> Result<Option<KycSubmission>, DatabaseError> {
        Ok(self.working.kyc.get(&id).cloned())
    }

    async fn update_kyc(&mut self, prior: KycStatus, submission: &KycSubmission) -> Result<bool, DatabaseError> {
        match self.working.kyc.get_mut(&submission.id) {
            Some(stored) if stored.status == prior => {
                *stored = submission.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_op(&mut self, op_id: Uuid) -> Result<Option<JourneyOp>, DatabaseError> {
        Ok(self
            .working
            .op_index
            .get(&op_id)
            .and_then(|seq| self.working.ops.get(seq))
            .cloned())
    }

    async fn insert_op(&mut self, op: &NewJourneyOp) -> Result<Option<JourneyOp>, DatabaseError> {
        if self.working.op_index.contains_key(&op.op_id) {
            return Ok(None);
        }
        let server_seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = op.clone().sequenced(server_seq, Utc::now());
        self.working.op_index.insert(stored.op_id, server_seq);
        self.working.ops.insert(server_seq, stored.clone());
        Ok(Some(stored))
    }

    async fn ops_after(&mut self, after: i64, user_id: Option<Uuid>, limit: i64) -> Result<Vec<JourneyOp>, DatabaseError> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(self
            .working
            .ops
            .range((after + 1)..)
            .map(|(_, op)| op)
            .filter(|op| user_id.map_or(true, |u| op.user_id == u))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn all_ops(&mut self) -> Result<Vec<JourneyOp>, DatabaseError> {
        Ok(self.working.ops.values().cloned().collect())
    }

    async fn journey(&mut self, id: Uuid) -> Result<Option<Journey>, DatabaseError> {
        Ok(self.working.journeys.get(&id).cloned())
    }

    async fn insert_journey(&mut self, journey: &Journey) -> Result<(), DatabaseError> {
        if self.working.journeys.contains_key(&journey.id) {
            return Err(DatabaseError::UniqueViolation("journeys_pkey".to_string()));
        }
        self.working.journeys.insert(journey.id, journey.clone());
        Ok(())
    }

    async fn save_journey(&mut self, journey: &Journey) -> Result<(), DatabaseError> {
        self.working.journeys.insert(journey.id, journey.clone());
        Ok(())
    }

    async fn clear_journeys(&mut self) -> Result<u64, DatabaseError> {
        let cleared = self.working.journeys.len() as u64;
        self.working.journeys.clear();
        Ok(cleared)
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        let MemoryTx {
            mut guard,
            working,
            writable,
            ..
        } = *self;
        if writable {
            *guard = working;
        }
        Ok(())
    }
}
