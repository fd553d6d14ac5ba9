use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use super::{Transition, TransitionError};
use crate::database::models::{BagLift, BagLiftStatus, LedgerEntry, LedgerSource, Mason};
use crate::ledger::Effect;
use crate::policy::PointsPolicy;

/// Body of `PATCH /bag-lifts/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BagLiftUpdate {
    pub status: Option<BagLiftStatus>,
    pub memo: Option<String>,
    pub site_id: Option<Uuid>,
    pub site_key_person_name: Option<String>,
    pub site_key_person_phone: Option<String>,
    pub verification_site_image_url: Option<String>,
    pub verification_proof_image_url: Option<String>,
}

impl BagLiftUpdate {
    pub fn status(status: BagLiftStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

/// Plan a bag-lift status change.
///
/// `mason` is the lift owner as locked at the start of the transaction; its
/// `bags_lifted` is the pre-increment cumulative count the bonuses are
/// computed from. Slab and referral bonuses are never clawed back when an
/// approved lift is later rejected, and a referrer is paid for a referee at
/// most once (`referral_already_paid`), even if a reversal lets the referee
/// cross the threshold again.
pub fn plan(
    lift: &BagLift,
    mason: &Mason,
    update: &BagLiftUpdate,
    policy: &PointsPolicy,
    referral_already_paid: bool,
    approver: Uuid,
    now: DateTime<Utc>,
) -> Result<Transition<BagLift>, TransitionError> {
    let target = update
        .status
        .ok_or_else(|| TransitionError::Validation("status is required".to_string()))?;

    let mut record = lift.clone();
    record.updated_at = now;
    if let Some(memo) = &update.memo {
        record.memo = Some(memo.clone());
    }

    match (lift.status, target) {
        (from, to) if from == to => Err(TransitionError::SameStatus {
            entity: "Bag lift",
            status: to.to_string(),
        }),

        (BagLiftStatus::Pending, BagLiftStatus::Approved) => {
            record.status = BagLiftStatus::Approved;
            record.approved_by = Some(approver);
            record.approved_at = Some(now);
            attach_verification(&mut record, update);

            let prior = mason.bags_lifted;
            let mut effects = vec![
                Effect::Post(LedgerEntry::new(
                    mason.id,
                    LedgerSource::BagLift,
                    Some(lift.id),
                    lift.points_credited,
                    format!("Bag lift approved: {} bags", lift.bag_count),
                )),
                Effect::Bags {
                    mason_id: mason.id,
                    delta: lift.bag_count,
                },
            ];

            let extra = policy.extra_bonus_amount(prior, lift.bag_count, lift.lifted_at.date_naive());
            if extra > 0 {
                effects.push(Effect::Post(LedgerEntry::new(
                    mason.id,
                    LedgerSource::ExtraBonus,
                    Some(lift.id),
                    extra,
                    format!("Slab bonus: {} -> {} bags", prior, prior.saturating_add(lift.bag_count)),
                )));
            }

            if let Some(referrer) = mason.referred_by.filter(|_| !referral_already_paid) {
                let referral = policy.referral_bonus_amount(prior, lift.bag_count);
                if referral > 0 {
                    effects.push(Effect::Post(LedgerEntry::new(
                        referrer,
                        LedgerSource::ReferralBonus,
                        Some(mason.id),
                        referral,
                        format!("Referral bonus for {}", mason.name),
                    )));
                }
            }

            Ok(Transition {
                record,
                effects,
                message: format!("Bag lift approved; {} points credited", lift.points_credited),
            })
        }

        (BagLiftStatus::Pending, BagLiftStatus::Rejected) => {
            record.status = BagLiftStatus::Rejected;
            Ok(Transition {
                record,
                effects: Vec::new(),
                message: "Bag lift rejected".to_string(),
            })
        }

        (BagLiftStatus::Approved, BagLiftStatus::Rejected) => {
            record.status = BagLiftStatus::Rejected;
            let effects = vec![
                Effect::Post(LedgerEntry::new(
                    mason.id,
                    LedgerSource::Adjustment,
                    Some(lift.id),
                    -lift.points_credited,
                    format!("Reversal of approved bag lift: {} bags", lift.bag_count),
                )),
                Effect::Bags {
                    mason_id: mason.id,
                    delta: -lift.bag_count,
                },
            ];
            Ok(Transition {
                record,
                effects,
                message: format!("Bag lift approval reversed; {} points debited", lift.points_credited),
            })
        }

        (from, to) => Err(TransitionError::illegal("bag lift", from, to)),
    }
}

fn attach_verification(record: &mut BagLift, update: &BagLiftUpdate) {
    if update.site_id.is_some() {
        record.site_id = update.site_id;
    }
    if let Some(v) = &update.site_key_person_name {
        record.site_key_person_name = Some(v.clone());
    }
    if let Some(v) = &update.site_key_person_phone {
        record.site_key_person_phone = Some(v.clone());
    }
    if let Some(v) = &update.verification_site_image_url {
        record.verification_site_image_url = Some(v.clone());
    }
    if let Some(v) = &update.verification_proof_image_url {
        record.verification_proof_image_url = Some(v.clone());
    }
}
