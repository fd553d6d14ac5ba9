//! Transaction boundary for every ledger, inventory and op-log mutation.
//!
//! A [`StoreTx`] is one database transaction. Dropping it without calling
//! [`StoreTx::commit`] rolls everything back, which is how every failed
//! transition and every failed sync op leaves no partial effects.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{DatabaseConfig, StoreBackend};

use crate::database::models::{
    BagLift, BagLiftStatus, Journey, JourneyOp, KycStatus, KycSubmission, LedgerEntry, Mason,
    NewJourneyOp, RedemptionStatus, Reward, RewardRedemption,
};
use crate::database::{DatabaseError, DatabaseManager};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Open the configured backend. Postgres pools are migrated before use.
pub async fn open(config: &DatabaseConfig) -> Result<Arc<dyn Store>, DatabaseError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let pool = DatabaseManager::connect(config).await?;
            DatabaseManager::migrate(&pool).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Open a read-write transaction. Rows fetched through it are locked
    /// until it commits or is dropped.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, DatabaseError>;

    /// Open a transaction for reads only; it takes no row locks and is
    /// never committed.
    async fn read(&self) -> Result<Box<dyn StoreTx>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait StoreTx: Send {
    // Masons
    async fn insert_mason(&mut self, mason: &Mason) -> Result<(), DatabaseError>;
    async fn mason(&mut self, id: Uuid) -> Result<Option<Mason>, DatabaseError>;
    async fn mason_ids(&mut self) -> Result<Vec<Uuid>, DatabaseError>;
    async fn adjust_mason_totals(&mut self, id: Uuid, points_delta: i64, bags_delta: i64) -> Result<(), DatabaseError>;
    async fn set_mason_totals(&mut self, id: Uuid, points_balance: i64, bags_lifted: i64) -> Result<(), DatabaseError>;
    async fn set_mason_kyc_status(&mut self, id: Uuid, status: KycStatus) -> Result<(), DatabaseError>;
    async fn update_mason_profile(&mut self, id: Uuid, name: Option<&str>, dealer_id: Option<Uuid>) -> Result<(), DatabaseError>;

    // Ledger
    async fn insert_ledger_entry(&mut self, entry: &LedgerEntry) -> Result<(), DatabaseError>;
    async fn ledger_entries(&mut self, mason_id: Uuid) -> Result<Vec<LedgerEntry>, DatabaseError>;
    async fn ledger_total(&mut self, mason_id: Uuid) -> Result<i64, DatabaseError>;
    async fn approved_bag_total(&mut self, mason_id: Uuid) -> Result<i64, DatabaseError>;

    // Rewards
    async fn insert_reward(&mut self, reward: &Reward) -> Result<(), DatabaseError>;
    async fn reward(&mut self, id: Uuid) -> Result<Option<Reward>, DatabaseError>;
    /// Move stock by `delta`. Returns false, changing nothing, when the
    /// result would be negative.
    async fn adjust_stock(&mut self, id: Uuid, delta: i64) -> Result<bool, DatabaseError>;

    // Bag lifts
    async fn insert_bag_lift(&mut self, lift: &BagLift) -> Result<(), DatabaseError>;
    async fn bag_lift(&mut self, id: Uuid) -> Result<Option<BagLift>, DatabaseError>;
    /// Write `lift` only if the stored status is still `prior`.
    async fn update_bag_lift(&mut self, prior: BagLiftStatus, lift: &BagLift) -> Result<bool, DatabaseError>;

    // Redemptions
    async fn insert_redemption(&mut self, redemption: &RewardRedemption) -> Result<(), DatabaseError>;
    async fn redemption(&mut self, id: Uuid) -> Result<Option<RewardRedemption>, DatabaseError>;
    async fn update_redemption(&mut self, prior: RedemptionStatus, redemption: &RewardRedemption) -> Result<bool, DatabaseError>;

    // KYC
    async fn insert_kyc(&mut self, submission: &KycSubmission) -> Result<(), DatabaseError>;
    async fn kyc(&mut self, id: Uuid) -> Result<Option<KycSubmission>, DatabaseError>;
    async fn update_kyc(&mut self, prior: KycStatus, submission: &KycSubmission) -> Result<bool, DatabaseError>;

    // Op log
    async fn find_op(&mut self, op_id: Uuid) -> Result<Option<JourneyOp>, DatabaseError>;
    /// Append an op; the store assigns `server_seq`. Returns `None` when
    /// the op id is already in the log.
    async fn insert_op(&mut self, op: &NewJourneyOp) -> Result<Option<JourneyOp>, DatabaseError>;
    async fn ops_after(&mut self, after: i64, user_id: Option<Uuid>, limit: i64) -> Result<Vec<JourneyOp>, DatabaseError>;
    async fn all_ops(&mut self) -> Result<Vec<JourneyOp>, DatabaseError>;

    // Journey projection
    async fn journey(&mut self, id: Uuid) -> Result<Option<Journey>, DatabaseError>;
    /// Create a journey row; fails with `UniqueViolation` if the id exists.
    async fn insert_journey(&mut self, journey: &Journey) -> Result<(), DatabaseError>;
    /// Create or overwrite the mutable columns of a journey row.
    async fn save_journey(&mut self, journey: &Journey) -> Result<(), DatabaseError>;
    async fn clear_journeys(&mut self) -> Result<u64, DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;
}
