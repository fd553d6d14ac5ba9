use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{Transition, TransitionError};
use crate::database::models::{LedgerEntry, LedgerSource, RedemptionStatus, Reward, RewardRedemption};
use crate::ledger::Effect;

/// Body of `PATCH /rewards-redemption/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionUpdate {
    pub status: Option<RedemptionStatus>,
    pub fulfillment_notes: Option<String>,
}

impl RedemptionUpdate {
    pub fn status(status: RedemptionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Plan a fulfillment step for a redemption.
///
/// Stock leaves inventory on approval and comes back only if an approved
/// redemption is rejected. Points were debited at placement, so every
/// rejection refunds them.
pub fn plan(
    redemption: &RewardRedemption,
    reward: &Reward,
    update: &RedemptionUpdate,
    now: DateTime<Utc>,
) -> Result<Transition<RewardRedemption>, TransitionError> {
    let target = match update.status {
        None => return Err(TransitionError::Validation("status is required".to_string())),
        Some(RedemptionStatus::Placed) => {
            return Err(TransitionError::Validation(
                "status must be one of approved, shipped, delivered, rejected".to_string(),
            ))
        }
        Some(status) => status,
    };

    let mut record = redemption.clone();
    record.status = target;
    record.updated_at = now;
    if let Some(notes) = &update.fulfillment_notes {
        record.fulfillment_notes = Some(notes.clone());
    }

    let refund = || {
        Effect::Post(LedgerEntry::new(
            redemption.mason_id,
            LedgerSource::Adjustment,
            Some(redemption.id),
            redemption.points_debited,
            format!("Refund for rejected redemption of {} x {}", redemption.quantity, reward.name),
        ))
    };

    let (effects, message) = match (redemption.status, target) {
        (from, to) if from == to => {
            return Err(TransitionError::SameStatus {
                entity: "Redemption",
                status: to.to_string(),
            })
        }
        (from, to) if from.is_terminal() => return Err(TransitionError::illegal("redemption", from, to)),

        (RedemptionStatus::Placed, RedemptionStatus::Approved) => {
            if reward.stock < redemption.quantity {
                return Err(TransitionError::InsufficientStock {
                    requested: redemption.quantity,
                    available: reward.stock,
                });
            }
            (
                vec![Effect::Stock {
                    reward_id: reward.id,
                    delta: -redemption.quantity,
                }],
                "Redemption approved".to_string(),
            )
        }

        (RedemptionStatus::Placed, RedemptionStatus::Rejected) => (
            vec![refund()],
            format!("Redemption rejected; {} points refunded", redemption.points_debited),
        ),

        (RedemptionStatus::Approved, RedemptionStatus::Rejected) => (
            vec![
                refund(),
                Effect::Stock {
                    reward_id: reward.id,
                    delta: redemption.quantity,
                },
            ],
            format!(
                "Redemption rejected; {} points refunded and {} restocked",
                redemption.points_debited, redemption.quantity
            ),
        ),

        (RedemptionStatus::Approved, RedemptionStatus::Shipped)
        | (RedemptionStatus::Approved, RedemptionStatus::Delivered)
        | (RedemptionStatus::Shipped, RedemptionStatus::Delivered) => (Vec::new(), format!("Redemption {}", target)),

        (from, to) => return Err(TransitionError::illegal("redemption", from, to)),
    };

    Ok(Transition {
        record,
        effects,
        message,
    })
}
