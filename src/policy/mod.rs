//! Points policy engine.
//!
//! Every function here is a pure function of its arguments and the policy
//! constants, so a transition that is retried after a rolled-back
//! transaction computes exactly the same bonuses again.
//!
//! Thresholds use crossed-not-met semantics: a bonus fires only when the
//! cumulative count moves from below a threshold to at-or-above it within
//! a single lift.

use chrono::NaiveDate;

use crate::config::PointsConfig;

#[derive(Debug, Clone)]
pub struct PointsPolicy {
    config: PointsConfig,
}

impl PointsPolicy {
    pub fn new(config: PointsConfig) -> Self {
        Self { config }
    }

    /// Points a lift of `bags` bags is worth, fixed when the lift is claimed
    pub fn points_for_bags(&self, bags: i64) -> i64 {
        bags.max(0).saturating_mul(self.config.points_per_bag.max(0))
    }

    /// One-off bonus paid when an account's KYC is first approved
    pub fn joining_bonus_amount(&self) -> i64 {
        self.config.joining_bonus.max(0)
    }

    /// Slab bonus for the slabs crossed by moving from `prior_cumulative`
    /// to `prior_cumulative + bags_in_lift`. Lifts dated outside the
    /// campaign window earn nothing.
    pub fn extra_bonus_amount(&self, prior_cumulative: i64, bags_in_lift: i64, lift_date: NaiveDate) -> i64 {
        let size = self.config.slab_size;
        if size <= 0 || self.config.slab_bonus <= 0 || bags_in_lift <= 0 {
            return 0;
        }
        if !self.in_slab_campaign(lift_date) {
            return 0;
        }

        let prior = prior_cumulative.max(0);
        let new = prior.saturating_add(bags_in_lift);
        let slabs_crossed = new / size - prior / size;

        slabs_crossed.saturating_mul(self.config.slab_bonus)
    }

    /// Bonus owed to the referrer when the referred account's cumulative
    /// bag count crosses the referral threshold in this lift
    pub fn referral_bonus_amount(&self, prior_cumulative: i64, bags_in_lift: i64) -> i64 {
        let threshold = self.config.referral_threshold;
        if threshold <= 0 || bags_in_lift <= 0 {
            return 0;
        }

        let new = prior_cumulative.saturating_add(bags_in_lift);
        if prior_cumulative < threshold && threshold <= new {
            self.config.referral_bonus.max(0)
        } else {
            0
        }
    }

    fn in_slab_campaign(&self, date: NaiveDate) -> bool {
        let after_start = self.config.slab_campaign_start.map_or(true, |start| date >= start);
        let before_end = self.config.slab_campaign_end.map_or(true, |end| date <= end);
        after_start && before_end
    }
}

impl Default for PointsPolicy {
    fn default() -> Self {
        Self::new(PointsConfig::default())
    }
}
