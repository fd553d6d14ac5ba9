use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::database::models::{BagLift, KycSubmission, LedgerEntry, LedgerSource, Mason, Reward, RewardRedemption};
use crate::ledger::{apply_effects, Effect};
use crate::policy::PointsPolicy;
use crate::services::ledger_service::{NewBagLift, NewKycSubmission, NewRedemption};
use crate::services::LedgerService;
use crate::store::{MemoryStore, Store};

/// Seeded in-memory store for service level tests
pub struct Fixture {
    store: Arc<MemoryStore>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    fn ledger(&self) -> LedgerService {
        LedgerService::new(self.store(), PointsPolicy::default())
    }

    pub async fn mason(&self, name: &str) -> Mason {
        let mason = Mason::new(name);
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_mason(&mason).await.unwrap();
        tx.commit().await.unwrap();
        mason
    }

    pub async fn referred_mason(&self, name: &str, referrer: Uuid) -> Mason {
        let mason = Mason::new(name).referred_by(referrer);
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_mason(&mason).await.unwrap();
        tx.commit().await.unwrap();
        mason
    }

    pub async fn reward(&self, name: &str, point_cost: i64, stock: i64) -> Reward {
        let reward = Reward::new(name, point_cost, stock);
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_reward(&reward).await.unwrap();
        tx.commit().await.unwrap();
        reward
    }

    /// Post a goodwill adjustment so the account has points to spend
    pub async fn credit(&self, mason_id: Uuid, points: i64) {
        let mut tx = self.store.begin().await.unwrap();
        let entry = LedgerEntry::new(mason_id, LedgerSource::Adjustment, None, points, "test credit");
        apply_effects(tx.as_mut(), &[Effect::Post(entry)]).await.unwrap();
        tx.commit().await.unwrap();
    }

    pub async fn bag_lift(&self, mason_id: Uuid, bags: i64) -> BagLift {
        self.ledger()
            .create_bag_lift(NewBagLift {
                mason_id,
                bag_count: bags,
                dealer_id: None,
                site_id: None,
                lifted_at: None,
            })
            .await
            .unwrap()
    }

    pub async fn redemption(&self, mason_id: Uuid, reward_id: Uuid, quantity: i64) -> RewardRedemption {
        self.ledger()
            .place_redemption(NewRedemption {
                mason_id,
                reward_id,
                quantity,
            })
            .await
            .unwrap()
    }

    pub async fn kyc(&self, mason_id: Uuid) -> KycSubmission {
        self.ledger()
            .submit_kyc(NewKycSubmission {
                mason_id,
                documents: json!({"aadhaar": "front.jpg"}),
            })
            .await
            .unwrap()
    }

    pub async fn mason_by_id(&self, id: Uuid) -> Mason {
        let mut tx = self.store.read().await.unwrap();
        tx.mason(id).await.unwrap().unwrap()
    }

    pub async fn ledger_sum(&self, mason_id: Uuid) -> i64 {
        let mut tx = self.store.read().await.unwrap();
        tx.ledger_total(mason_id).await.unwrap()
    }
}
