use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{Transition, TransitionError};
use crate::database::models::{KycStatus, KycSubmission, LedgerEntry, LedgerSource, Mason};
use crate::ledger::Effect;
use crate::policy::PointsPolicy;

/// Body of `PATCH /kyc-submissions/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KycUpdate {
    pub status: Option<KycStatus>,
    pub remark: Option<String>,
    pub mason_updates: Option<MasonUpdates>,
    pub documents: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasonUpdates {
    pub dealer_id: Option<Uuid>,
    pub name: Option<String>,
}

/// Plan a KYC decision.
///
/// The joining bonus is keyed on the account, not the submission: it is
/// paid when the account's mirrored status moves into approved and no
/// joining bonus has ever been posted for it (`bonus_already_paid`).
pub fn plan(
    submission: &KycSubmission,
    mason: &Mason,
    update: &KycUpdate,
    policy: &PointsPolicy,
    bonus_already_paid: bool,
    now: DateTime<Utc>,
) -> Result<Transition<KycSubmission>, TransitionError> {
    let target = match update.status {
        None => return Err(TransitionError::Validation("status is required".to_string())),
        Some(KycStatus::None) => {
            return Err(TransitionError::Validation(
                "status must be one of pending, approved, rejected".to_string(),
            ))
        }
        Some(status) => status,
    };

    let mut record = submission.clone();
    record.status = target;
    record.updated_at = now;
    if let Some(remark) = &update.remark {
        record.remark = Some(remark.clone());
    }
    if let Some(documents) = &update.documents {
        record.documents = documents.clone();
    }

    let mut effects = vec![Effect::KycMirror {
        mason_id: mason.id,
        status: target,
    }];

    if let Some(profile) = &update.mason_updates {
        let name = match profile.name.as_deref().map(str::trim) {
            Some("") => return Err(TransitionError::Validation("name must not be empty".to_string())),
            other => other.map(str::to_string),
        };
        if name.is_some() || profile.dealer_id.is_some() {
            effects.push(Effect::Profile {
                mason_id: mason.id,
                name,
                dealer_id: profile.dealer_id,
            });
        }
    }

    let bonus = policy.joining_bonus_amount();
    let pays_bonus = target == KycStatus::Approved
        && mason.kyc_status != KycStatus::Approved
        && !bonus_already_paid
        && bonus > 0;

    let message = if pays_bonus {
        effects.push(Effect::Post(LedgerEntry::new(
            mason.id,
            LedgerSource::JoiningBonus,
            Some(submission.id),
            bonus,
            "Joining bonus on KYC approval",
        )));
        format!("KYC approved; joining bonus of {} points credited", bonus)
    } else {
        format!("KYC {}", target)
    };

    Ok(Transition {
        record,
        effects,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::net_points;
    use serde_json::json;

    fn approve() -> KycUpdate {
        KycUpdate {
            status: Some(KycStatus::Approved),
            ..Default::default()
        }
    }

    #[test]
    fn first_approval_pays_joining_bonus() {
        let mut mason = Mason::new("Deepak");
        mason.kyc_status = KycStatus::Pending;
        let submission = KycSubmission::pending(mason.id, json!({}));

        let plan = plan(&submission, &mason, &approve(), &PointsPolicy::default(), false, Utc::now()).unwrap();
        assert_eq!(plan.record.status, KycStatus::Approved);
        assert_eq!(net_points(&plan.effects), 250);
        assert!(plan.effects.contains(&Effect::KycMirror {
            mason_id: mason.id,
            status: KycStatus::Approved
        }));
    }

    #[test]
    fn reapproval_never_pays_twice() {
        let mut mason = Mason::new("Deepak");
        mason.kyc_status = KycStatus::Approved;
        let submission = KycSubmission::pending(mason.id, json!({}));

        let already = plan(&submission, &mason, &approve(), &PointsPolicy::default(), false, Utc::now()).unwrap();
        assert_eq!(net_points(&already.effects), 0);

        // approved -> rejected -> approved on the same account
        mason.kyc_status = KycStatus::Rejected;
        let again = plan(&submission, &mason, &approve(), &PointsPolicy::default(), true, Utc::now()).unwrap();
        assert_eq!(net_points(&again.effects), 0);
    }

    #[test]
    fn profile_updates_ride_along() {
        let mason = Mason::new("Deepak");
        let submission = KycSubmission::pending(mason.id, json!({}));
        let dealer = Uuid::new_v4();
        let update = KycUpdate {
            status: Some(KycStatus::Rejected),
            remark: Some("blurry id".to_string()),
            mason_updates: Some(MasonUpdates {
                dealer_id: Some(dealer),
                name: Some("  Deepak K ".to_string()),
            }),
            documents: None,
        };

        let plan = plan(&submission, &mason, &update, &PointsPolicy::default(), false, Utc::now()).unwrap();
        assert_eq!(plan.record.remark.as_deref(), Some("blurry id"));
        assert!(plan.effects.contains(&Effect::Profile {
            mason_id: mason.id,
            name: Some("Deepak K".to_string()),
            dealer_id: Some(dealer),
        }));
    }

    #[test]
    fn none_status_and_blank_name_are_rejected() {
        let mason = Mason::new("Deepak");
        let submission = KycSubmission::pending(mason.id, json!({}));
        let policy = PointsPolicy::default();

        let none = KycUpdate {
            status: Some(KycStatus::None),
            ..Default::default()
        };
        assert!(matches!(
            plan(&submission, &mason, &none, &policy, false, Utc::now()),
            Err(TransitionError::Validation(_))
        ));

        let blank = KycUpdate {
            status: Some(KycStatus::Approved),
            mason_updates: Some(MasonUpdates {
                dealer_id: None,
                name: Some("   ".to_string()),
            }),
            ..Default::default()
        };
        assert!(matches!(
            plan(&submission, &mason, &blank, &policy, false, Utc::now()),
            Err(TransitionError::Validation(_))
        ));
    }
}
