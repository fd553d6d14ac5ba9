use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::approval::{self, BagLiftUpdate, KycUpdate, RedemptionUpdate, Transition, TransitionError};
use crate::database::models::{BagLift, KycSubmission, LedgerSource, RewardRedemption};
use crate::ledger::apply_effects;
use crate::policy::PointsPolicy;
use crate::store::Store;

/// Runs the approval state machines inside store transactions.
///
/// Every transition follows the same shape: lock the record and its owner,
/// plan, write the new status conditionally on the status we planned from,
/// apply the effects, commit. Any error drops the transaction, which rolls
/// back every write made so far.
pub struct ApprovalService {
    store: Arc<dyn Store>,
    policy: PointsPolicy,
}

impl ApprovalService {
    pub fn new(store: Arc<dyn Store>, policy: PointsPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn transition_bag_lift(
        &self,
        id: Uuid,
        update: BagLiftUpdate,
        approver: Uuid,
    ) -> Result<Transition<BagLift>, TransitionError> {
        let mut tx = self.store.begin().await?;

        let lift = tx
            .bag_lift(id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(format!("Bag lift {}", id)))?;
        let mason = tx
            .mason(lift.mason_id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(format!("Mason {}", lift.mason_id)))?;

        let referral_already_paid = match mason.referred_by {
            Some(referrer) => tx.ledger_entries(referrer).await?.iter().any(|entry| {
                entry.source_type == LedgerSource::ReferralBonus && entry.source_id == Some(mason.id)
            }),
            None => false,
        };

        let plan = approval::bag_lift::plan(
            &lift,
            &mason,
            &update,
            &self.policy,
            referral_already_paid,
            approver,
            Utc::now(),
        )?;

        if !tx.update_bag_lift(lift.status, &plan.record).await? {
            return Err(TransitionError::Conflict(format!("Bag lift {} changed status concurrently", id)));
        }
        apply_effects(tx.as_mut(), &plan.effects).await?;
        tx.commit().await?;

        tracing::info!(
            bag_lift_id = %id,
            mason_id = %lift.mason_id,
            from = %lift.status,
            to = %plan.record.status,
            effects = plan.effects.len(),
            "Bag lift transitioned"
        );
        Ok(plan)
    }

    pub async fn transition_kyc(
        &self,
        id: Uuid,
        update: KycUpdate,
    ) -> Result<Transition<KycSubmission>, TransitionError> {
        let mut tx = self.store.begin().await?;

        let submission = tx
            .kyc(id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(format!("KYC submission {}", id)))?;
        let mason = tx
            .mason(submission.mason_id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(format!("Mason {}", submission.mason_id)))?;
        let bonus_already_paid = tx
            .ledger_entries(mason.id)
            .await?
            .iter()
            .any(|entry| entry.source_type == LedgerSource::JoiningBonus);

        let plan = approval::kyc::plan(&submission, &mason, &update, &self.policy, bonus_already_paid, Utc::now())?;

        if !tx.update_kyc(submission.status, &plan.record).await? {
            return Err(TransitionError::Conflict(format!("KYC submission {} changed status concurrently", id)));
        }
        apply_effects(tx.as_mut(), &plan.effects).await?;
        tx.commit().await?;

        tracing::info!(
            kyc_id = %id,
            mason_id = %mason.id,
            from = %submission.status,
            to = %plan.record.status,
            "KYC submission transitioned"
        );
        Ok(plan)
    }

    pub async fn transition_redemption(
        &self,
        id: Uuid,
        update: RedemptionUpdate,
    ) -> Result<Transition<RewardRedemption>, TransitionError> {
        let mut tx = self.store.begin().await?;

        let redemption = tx
            .redemption(id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(format!("Redemption {}", id)))?;
        let reward = tx
            .reward(redemption.reward_id)
            .await?
            .ok_or_else(|| TransitionError::NotFound(format!("Reward {}", redemption.reward_id)))?;

        let plan = approval::redemption::plan(&redemption, &reward, &update, Utc::now())?;

        if !tx.update_redemption(redemption.status, &plan.record).await? {
            return Err(TransitionError::Conflict(format!("Redemption {} changed status concurrently", id)));
        }
        apply_effects(tx.as_mut(), &plan.effects).await?;
        tx.commit().await?;

        tracing::info!(
            redemption_id = %id,
            reward_id = %reward.id,
            from = %redemption.status,
            to = %plan.record.status,
            "Redemption transitioned"
        );
        Ok(plan)
    }
}
