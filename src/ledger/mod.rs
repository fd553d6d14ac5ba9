//! Ledger and inventory effects.
//!
//! Transitions never touch balances or stock directly: they describe what
//! must change as a list of [`Effect`]s, and [`apply_effects`] writes them
//! through the caller's transaction. A ledger entry and the matching change
//! to the cached balance are one effect, so they cannot be written apart.

use serde::Serialize;
use uuid::Uuid;

use crate::approval::TransitionError;
use crate::database::models::{KycStatus, LedgerEntry};
use crate::database::DatabaseError;
use crate::store::StoreTx;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Insert a ledger entry and move the owner's cached balance by its points
    Post(LedgerEntry),
    /// Move the cached cumulative bag count
    Bags { mason_id: Uuid, delta: i64 },
    /// Move reward stock; fails the transition if stock would go negative
    Stock { reward_id: Uuid, delta: i64 },
    /// Mirror a KYC decision onto the account
    KycMirror { mason_id: Uuid, status: KycStatus },
    Profile {
        mason_id: Uuid,
        name: Option<String>,
        dealer_id: Option<Uuid>,
    },
}

impl Effect {
    pub fn points(&self) -> i64 {
        match self {
            Effect::Post(entry) => entry.points,
            _ => 0,
        }
    }
}

/// Total points the effects post, per effect list
pub fn net_points(effects: &[Effect]) -> i64 {
    effects.iter().map(Effect::points).sum()
}

pub async fn apply_effects(tx: &mut dyn StoreTx, effects: &[Effect]) -> Result<(), TransitionError> {
    for effect in effects {
        match effect {
            Effect::Post(entry) => {
                tx.insert_ledger_entry(entry).await.map_err(|e| match e {
                    DatabaseError::UniqueViolation(_) => TransitionError::Conflict(format!(
                        "{} ledger entry for {} already exists",
                        entry.source_type,
                        entry.source_id.map(|id| id.to_string()).unwrap_or_default()
                    )),
                    other => other.into(),
                })?;
                tx.adjust_mason_totals(entry.mason_id, entry.points, 0).await?;
            }
            Effect::Bags { mason_id, delta } => {
                tx.adjust_mason_totals(*mason_id, 0, *delta).await?;
            }
            Effect::Stock { reward_id, delta } => {
                if !tx.adjust_stock(*reward_id, *delta).await? {
                    let available = tx.reward(*reward_id).await?.map(|r| r.stock).unwrap_or(0);
                    return Err(TransitionError::InsufficientStock {
                        requested: -delta,
                        available,
                    });
                }
            }
            Effect::KycMirror { mason_id, status } => {
                tx.set_mason_kyc_status(*mason_id, *status).await?;
            }
            Effect::Profile {
                mason_id,
                name,
                dealer_id,
            } => {
                tx.update_mason_profile(*mason_id, name.as_deref(), *dealer_id).await?;
            }
        }
    }
    Ok(())
}

/// Result of re-summing an account's ledger against its cached totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub mason_id: Uuid,
    pub cached_balance: i64,
    pub ledger_balance: i64,
    pub cached_bags: i64,
    pub approved_bags: i64,
    pub corrected: bool,
}

/// Recompute the cached totals of one mason from the ledger and approved
/// lifts, rewriting them if they drifted. Returns `None` for unknown ids.
pub async fn reconcile(tx: &mut dyn StoreTx, mason_id: Uuid) -> Result<Option<Reconciliation>, DatabaseError> {
    let Some(mason) = tx.mason(mason_id).await? else {
        return Ok(None);
    };

    let ledger_balance = tx.ledger_total(mason_id).await?;
    let approved_bags = tx.approved_bag_total(mason_id).await?;
    let corrected = ledger_balance != mason.points_balance || approved_bags != mason.bags_lifted;

    if corrected {
        tracing::warn!(
            mason_id = %mason_id,
            cached_balance = mason.points_balance,
            ledger_balance,
            cached_bags = mason.bags_lifted,
            approved_bags,
            "Cached totals drifted from ledger; rewriting"
        );
        tx.set_mason_totals(mason_id, ledger_balance, approved_bags).await?;
    }

    Ok(Some(Reconciliation {
        mason_id,
        cached_balance: mason.points_balance,
        ledger_balance,
        cached_bags: mason.bags_lifted,
        approved_bags,
        corrected,
    }))
}
