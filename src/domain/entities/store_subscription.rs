use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::subscription_plan::BillingCycle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Canceled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trial => "trial",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trial" | "trialing" => SubscriptionStatus::Trial,
            "active" => SubscriptionStatus::Active,
            "canceled" | "cancelled" => SubscriptionStatus::Canceled,
            _ => SubscriptionStatus::Expired,
        }
    }

    /// Statuses that still grant access to the plan.
    pub fn is_live(&self) -> bool {
        matches!(self, SubscriptionStatus::Trial | SubscriptionStatus::Active)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreSubscription {
    pub id: Uuid,
    pub store_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub billing_cycle: BillingCycle,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub trial_end_date: Option<NaiveDateTime>,
    pub next_billing_date: Option<NaiveDateTime>,
    pub auto_renew: bool,
    pub converted_from_trial: bool,
    pub canceled_at: Option<NaiveDateTime>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl StoreSubscription {
    pub fn is_in_trial(&self, now: NaiveDateTime) -> bool {
        self.status == SubscriptionStatus::Trial
            && self.trial_end_date.is_some_and(|end| end > now)
    }

    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        let end_passed = self.end_date < now;
        if self.status == SubscriptionStatus::Trial {
            let trial_passed = self.trial_end_date.is_some_and(|end| end < now);
            return end_passed || trial_passed;
        }
        end_passed
    }

    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        self.status.is_live() && !self.is_expired(now)
    }

    /// The moment access ends: the earlier of trial end and period end while trialing.
    pub fn expiration(&self) -> NaiveDateTime {
        match (self.status, self.trial_end_date) {
            (SubscriptionStatus::Trial, Some(trial_end)) if trial_end < self.end_date => trial_end,
            _ => self.end_date,
        }
    }

    pub fn days_until_expiration(&self, now: NaiveDateTime) -> i64 {
        let expiration = self.expiration();
        if expiration < now {
            return 0;
        }
        (expiration - now).num_days()
    }

    pub fn is_eligible_for_auto_renewal(&self, now: NaiveDateTime) -> bool {
        self.status == SubscriptionStatus::Active && self.auto_renew && !self.is_expired(now)
    }

    /// Cancellation requested for the end of the period: usable until then.
    pub fn is_pending_cancellation(&self, now: NaiveDateTime) -> bool {
        self.status.is_live() && self.canceled_at.is_some() && !self.is_expired(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn subscription(status: SubscriptionStatus) -> StoreSubscription {
        let now = Utc::now().naive_utc();
        StoreSubscription {
            id: Uuid::new_v4(),
            store_id: Uuid::new_v4(),
            plan_id: Uuid::new_v4(),
            status,
            billing_cycle: BillingCycle::Monthly,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(29),
            trial_end_date: None,
            next_billing_date: None,
            auto_renew: true,
            converted_from_trial: false,
            canceled_at: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn trial_expires_at_trial_end_even_if_period_runs() {
        let now = Utc::now().naive_utc();
        let mut sub = subscription(SubscriptionStatus::Trial);
        sub.trial_end_date = Some(now - Duration::hours(1));
        assert!(sub.is_expired(now));
        assert!(!sub.is_active(now));
        assert!(!sub.is_in_trial(now));
    }

    #[test]
    fn running_trial_is_active_and_in_trial() {
        let now = Utc::now().naive_utc();
        let mut sub = subscription(SubscriptionStatus::Trial);
        sub.trial_end_date = Some(now + Duration::days(14));
        assert!(sub.is_active(now));
        assert!(sub.is_in_trial(now));
        assert_eq!(sub.days_until_expiration(now), 13);
    }

    #[test]
    fn canceled_is_not_active() {
        let now = Utc::now().naive_utc();
        let sub = subscription(SubscriptionStatus::Canceled);
        assert!(!sub.is_active(now));
        assert!(!sub.is_pending_cancellation(now));
        assert!(!sub.is_eligible_for_auto_renewal(now));
    }

    #[test]
    fn cancel_at_period_end_keeps_access() {
        let now = Utc::now().naive_utc();
        let mut sub = subscription(SubscriptionStatus::Active);
        sub.canceled_at = Some(now);
        sub.auto_renew = false;
        assert!(sub.is_active(now));
        assert!(sub.is_pending_cancellation(now));
        assert!(!sub.is_eligible_for_auto_renewal(now));
    }

    #[test]
    fn days_until_expiration_floors_at_zero() {
        let now = Utc::now().naive_utc();
        let mut sub = subscription(SubscriptionStatus::Active);
        sub.end_date = now - Duration::days(3);
        assert_eq!(sub.days_until_expiration(now), 0);
        assert!(!sub.is_eligible_for_auto_renewal(now));
    }

    #[test]
    fn active_with_auto_renew_is_eligible() {
        let now = Utc::now().naive_utc();
        let sub = subscription(SubscriptionStatus::Active);
        assert!(sub.is_eligible_for_auto_renewal(now));
    }
}
