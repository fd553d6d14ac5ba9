use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::approval::TransitionError;
use crate::database::models::{
    BagLift, KycStatus, KycSubmission, LedgerEntry, LedgerSource, Mason, RedemptionStatus, RewardRedemption,
};
use crate::database::DatabaseError;
use crate::ledger::{self, apply_effects, Effect, Reconciliation};
use crate::policy::PointsPolicy;
use crate::store::Store;

/// Body of `POST /bag-lifts`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBagLift {
    pub mason_id: Uuid,
    pub bag_count: i64,
    pub dealer_id: Option<Uuid>,
    pub site_id: Option<Uuid>,
    pub lifted_at: Option<DateTime<Utc>>,
}

/// Body of `POST /rewards-redemption`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRedemption {
    pub mason_id: Uuid,
    pub reward_id: Uuid,
    pub quantity: i64,
}

/// Body of `POST /kyc-submissions`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewKycSubmission {
    pub mason_id: Uuid,
    #[serde(default)]
    pub documents: Value,
}

/// Record creation that feeds the approval machines, account reads and
/// ledger reconciliation.
pub struct LedgerService {
    store: Arc<dyn Store>,
    policy: PointsPolicy,
}

impl LedgerService {
    pub fn new(store: Arc<dyn Store>, policy: PointsPolicy) -> Self {
        Self { store, policy }
    }

    /// Claim a bag lift. Its point value is fixed now, from the policy in
    /// force at claim time.
    pub async fn create_bag_lift(&self, input: NewBagLift) -> Result<BagLift, TransitionError> {
        if input.bag_count <= 0 {
            return Err(TransitionError::Validation("bagCount must be greater than zero".to_string()));
        }

        let mut tx = self.store.begin().await?;
        let mason = tx
            .mason(input.mason_id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(format!("Mason {}", input.mason_id)))?;

        let mut lift = BagLift::pending(mason.id, input.bag_count, self.policy.points_for_bags(input.bag_count));
        lift.dealer_id = input.dealer_id.or(mason.dealer_id);
        lift.site_id = input.site_id;
        if let Some(lifted_at) = input.lifted_at {
            lift.lifted_at = lifted_at;
        }

        tx.insert_bag_lift(&lift).await?;
        tx.commit().await?;

        tracing::info!(
            bag_lift_id = %lift.id,
            mason_id = %mason.id,
            bags = lift.bag_count,
            points = lift.points_credited,
            "Bag lift claimed"
        );
        Ok(lift)
    }

    /// Place a redemption, debiting its full point cost immediately.
    pub async fn place_redemption(&self, input: NewRedemption) -> Result<RewardRedemption, TransitionError> {
        if input.quantity <= 0 {
            return Err(TransitionError::Validation("quantity must be greater than zero".to_string()));
        }

        let mut tx = self.store.begin().await?;
        let mason = tx
            .mason(input.mason_id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(format!("Mason {}", input.mason_id)))?;
        let reward = tx
            .reward(input.reward_id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(format!("Reward {}", input.reward_id)))?;

        if !reward.is_active {
            return Err(TransitionError::Validation(format!("Reward {} is not active", reward.name)));
        }
        let required = reward
            .point_cost
            .checked_mul(input.quantity)
            .ok_or_else(|| TransitionError::Validation("quantity is too large".to_string()))?;
        if mason.points_balance < required {
            return Err(TransitionError::InsufficientPoints {
                required,
                balance: mason.points_balance,
            });
        }

        let now = Utc::now();
        let redemption = RewardRedemption {
            id: Uuid::new_v4(),
            mason_id: mason.id,
            reward_id: reward.id,
            quantity: input.quantity,
            points_debited: required,
            status: RedemptionStatus::Placed,
            fulfillment_notes: None,
            created_at: now,
            updated_at: now,
        };
        tx.insert_redemption(&redemption).await?;
        apply_effects(
            tx.as_mut(),
            &[Effect::Post(LedgerEntry::new(
                mason.id,
                LedgerSource::Redemption,
                Some(redemption.id),
                -required,
                format!("Redeemed {} x {}", input.quantity, reward.name),
            ))],
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            redemption_id = %redemption.id,
            mason_id = %mason.id,
            reward_id = %reward.id,
            points = required,
            "Redemption placed"
        );
        Ok(redemption)
    }

    pub async fn submit_kyc(&self, input: NewKycSubmission) -> Result<KycSubmission, TransitionError> {
        let documents = if input.documents.is_null() {
            Value::Object(Default::default())
        } else {
            input.documents
        };

        let mut tx = self.store.begin().await?;
        let mason = tx
            .mason(input.mason_id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(format!("Mason {}", input.mason_id)))?;

        let submission = KycSubmission::pending(mason.id, documents);
        tx.insert_kyc(&submission).await?;
        // An approved account stays approved while a new submission is reviewed
        if mason.kyc_status != KycStatus::Approved {
            tx.set_mason_kyc_status(mason.id, KycStatus::Pending).await?;
        }
        tx.commit().await?;

        tracing::info!(kyc_id = %submission.id, mason_id = %mason.id, "KYC submitted");
        Ok(submission)
    }

    pub async fn mason(&self, id: Uuid) -> Result<Option<Mason>, DatabaseError> {
        self.store.read().await?.mason(id).await
    }

    pub async fn ledger(&self, mason_id: Uuid) -> Result<Option<Vec<LedgerEntry>>, DatabaseError> {
        let mut tx = self.store.read().await?;
        if tx.mason(mason_id).await?.is_none() {
            return Ok(None);
        }
        tx.ledger_entries(mason_id).await.map(Some)
    }

    pub async fn bag_lift(&self, id: Uuid) -> Result<Option<BagLift>, DatabaseError> {
        self.store.read().await?.bag_lift(id).await
    }

    pub async fn kyc(&self, id: Uuid) -> Result<Option<KycSubmission>, DatabaseError> {
        self.store.read().await?.kyc(id).await
    }

    pub async fn redemption(&self, id: Uuid) -> Result<Option<RewardRedemption>, DatabaseError> {
        self.store.read().await?.redemption(id).await
    }

    pub async fn reconcile(&self, mason_id: Uuid) -> Result<Option<Reconciliation>, DatabaseError> {
        let mut tx = self.store.begin().await?;
        let report = ledger::reconcile(tx.as_mut(), mason_id).await?;
        tx.commit().await?;
        Ok(report)
    }

    /// Reconcile every account, one transaction each.
    pub async fn reconcile_all(&self) -> Result<Vec<Reconciliation>, DatabaseError> {
        let ids = self.store.read().await?.mason_ids().await?;
        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(report) = self.reconcile(id).await? {
                reports.push(report);
            }
        }
        Ok(reports)
    }
}
