//! Periodic subscription maintenance: renewals, expirations, overdue invoices,
//! owner reminders and usage recounts.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::email_templates::{
    invoice_overdue_email, subscription_expiring_email, trial_ending_email, usage_limit_email,
};
use crate::application::use_cases::{
    invitation::InvitationUseCases,
    invoice::{InvoiceRepo, InvoiceUseCases},
    product::ProductRepo,
    store::StoreRepo,
    subscription::{SubscriptionRepo, SubscriptionUseCases, due_for_renewal},
    subscription_plan::PlanRepo,
    usage::UsageUseCases,
    user::{EmailSender, UserRepo},
};
use crate::domain::entities::{
    invoice::InvoiceStatus,
    store::Store,
    store_subscription::SubscriptionStatus,
    usage_metric::MetricType,
};

pub const LIMIT_ALERT_THRESHOLD: f64 = 0.8;

const LIVE: [SubscriptionStatus; 2] = [SubscriptionStatus::Trial, SubscriptionStatus::Active];

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub app_origin: String,
    pub reminder_days: i64,
    /// How often the job runs. Reminders fire once per run window.
    pub interval: ChronoDuration,
}

/// Per-step counts of one maintenance run. Failed steps count as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerReport {
    pub renewed: usize,
    pub expired: usize,
    pub cancellations_completed: usize,
    pub invoices_marked_overdue: usize,
    pub expiration_reminders: usize,
    pub trial_reminders: usize,
    pub overdue_reminders: usize,
    pub limit_alerts: usize,
    pub usage_recounted: usize,
    pub invitations_expired: u64,
}

pub struct SchedulerRepos {
    pub subscriptions: Arc<dyn SubscriptionRepo>,
    pub plans: Arc<dyn PlanRepo>,
    pub invoices: Arc<dyn InvoiceRepo>,
    pub stores: Arc<dyn StoreRepo>,
    pub users: Arc<dyn UserRepo>,
    pub products: Arc<dyn ProductRepo>,
}

#[derive(Clone)]
pub struct SubscriptionScheduler {
    subscriptions: Arc<dyn SubscriptionRepo>,
    plans: Arc<dyn PlanRepo>,
    invoice_repo: Arc<dyn InvoiceRepo>,
    stores: Arc<dyn StoreRepo>,
    users: Arc<dyn UserRepo>,
    products: Arc<dyn ProductRepo>,
    lifecycle: SubscriptionUseCases,
    invoices: InvoiceUseCases,
    usage: UsageUseCases,
    invitations: InvitationUseCases,
    email: Arc<dyn EmailSender>,
    settings: SchedulerSettings,
}

impl SubscriptionScheduler {
    pub fn new(
        repos: SchedulerRepos,
        lifecycle: SubscriptionUseCases,
        invoices: InvoiceUseCases,
        usage: UsageUseCases,
        invitations: InvitationUseCases,
        email: Arc<dyn EmailSender>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            subscriptions: repos.subscriptions,
            plans: repos.plans,
            invoice_repo: repos.invoices,
            stores: repos.stores,
            users: repos.users,
            products: repos.products,
            lifecycle,
            invoices,
            usage,
            invitations,
            email,
            settings,
        }
    }

    /// Runs every step in order. A failing step is logged and the run continues.
    pub async fn run_all(&self) -> SchedulerReport {
        let days = self.settings.reminder_days;
        let report = SchedulerReport {
            renewed: logged("auto renewals", self.process_auto_renewals().await),
            expired: logged("expirations", self.process_expirations().await),
            cancellations_completed: logged(
                "pending cancellations",
                self.process_pending_cancellations().await,
            ),
            invoices_marked_overdue: logged("overdue invoices", self.mark_overdue_invoices().await),
            expiration_reminders: logged(
                "expiration reminders",
                self.send_expiration_reminders(days).await,
            ),
            trial_reminders: logged(
                "trial reminders",
                self.send_trial_ending_reminders(days).await,
            ),
            overdue_reminders: logged(
                "overdue reminders",
                self.send_overdue_invoice_reminders(days).await,
            ),
            limit_alerts: logged(
                "limit alerts",
                self.send_limit_approaching_alerts(LIMIT_ALERT_THRESHOLD).await,
            ),
            usage_recounted: logged("usage recount", self.update_all_usage_metrics().await),
            invitations_expired: logged("stale invitations", self.invitations.expire_stale().await),
        };
        info!(?report, "Subscription maintenance finished");
        report
    }

    // ========================================================================
    // Lifecycle steps
    // ========================================================================

    /// Renews auto-renewing subscriptions whose period ends within the hour,
    /// including periods that ended while no run happened.
    #[instrument(skip(self))]
    pub async fn process_auto_renewals(&self) -> AppResult<usize> {
        let now = Utc::now().naive_utc();
        let candidates = self
            .subscriptions
            .list_by_status(&[SubscriptionStatus::Active])
            .await?;
        let mut renewed = 0;
        for subscription in due_for_renewal(candidates, now, ChronoDuration::hours(1)) {
            match self.lifecycle.renew(&subscription).await {
                Ok(_) => renewed += 1,
                Err(e) => {
                    error!(subscription_id = %subscription.id, error = ?e, "Auto renewal failed")
                }
            }
        }
        info!(renewed, "Processed auto renewals");
        Ok(renewed)
    }

    /// Live subscriptions past their end that are not being renewed. A trial with
    /// auto renew converts into a paid period instead of expiring.
    #[instrument(skip(self))]
    pub async fn process_expirations(&self) -> AppResult<usize> {
        let now = Utc::now().naive_utc();
        let mut expired = 0;
        for subscription in self.subscriptions.list_by_status(&LIVE).await? {
            if !subscription.is_expired(now) || subscription.canceled_at.is_some() {
                continue;
            }
            let converts = subscription.status == SubscriptionStatus::Trial && subscription.auto_renew;
            if converts {
                if let Err(e) = self.lifecycle.renew(&subscription).await {
                    error!(subscription_id = %subscription.id, error = ?e, "Trial conversion failed");
                }
                continue;
            }
            // Renewing subscriptions never expire here; a failed renewal is retried next run.
            if subscription.auto_renew {
                continue;
            }
            match self.lifecycle.expire(&subscription).await {
                Ok(_) => expired += 1,
                Err(e) => {
                    error!(subscription_id = %subscription.id, error = ?e, "Expiration failed")
                }
            }
        }
        info!(expired, "Processed expirations");
        Ok(expired)
    }

    /// Subscriptions canceled for the end of their period whose period is over.
    #[instrument(skip(self))]
    pub async fn process_pending_cancellations(&self) -> AppResult<usize> {
        let now = Utc::now().naive_utc();
        let mut completed = 0;
        for subscription in self.subscriptions.list_by_status(&LIVE).await? {
            if subscription.canceled_at.is_none() || !subscription.is_expired(now) {
                continue;
            }
            match self.lifecycle.expire(&subscription).await {
                Ok(_) => completed += 1,
                Err(e) => {
                    error!(subscription_id = %subscription.id, error = ?e, "Cancellation step failed")
                }
            }
        }
        info!(completed, "Processed pending cancellations");
        Ok(completed)
    }

    #[instrument(skip(self))]
    pub async fn mark_overdue_invoices(&self) -> AppResult<usize> {
        let mut marked = 0;
        for invoice in self.invoices.overdue(0).await? {
            self.invoices
                .update_status(invoice.id, InvoiceStatus::Overdue)
                .await?;
            marked += 1;
        }
        info!(marked, "Marked overdue invoices");
        Ok(marked)
    }

    // ========================================================================
    // Reminders
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn send_expiration_reminders(&self, days: i64) -> AppResult<usize> {
        let now = Utc::now().naive_utc();
        let mut sent = 0;
        for subscription in self
            .subscriptions
            .list_by_status(&[SubscriptionStatus::Active])
            .await?
        {
            if subscription.auto_renew || !self.due_for_reminder(subscription.end_date, now, days) {
                continue;
            }
            let Some((store, owner_email)) = self.owner_of(subscription.store_id).await? else {
                continue;
            };
            let (subject, html) = subscription_expiring_email(
                &self.settings.app_origin,
                &store.name,
                subscription.days_until_expiration(now),
                subscription.end_date,
            );
            sent += self.send(&owner_email, &subject, &html).await;
        }
        info!(sent, "Sent expiration reminders");
        Ok(sent)
    }

    #[instrument(skip(self))]
    pub async fn send_trial_ending_reminders(&self, days: i64) -> AppResult<usize> {
        let now = Utc::now().naive_utc();
        let mut sent = 0;
        for subscription in self
            .subscriptions
            .list_by_status(&[SubscriptionStatus::Trial])
            .await?
        {
            let Some(trial_end) = subscription.trial_end_date else {
                continue;
            };
            if !subscription.is_in_trial(now) || !self.due_for_reminder(trial_end, now, days) {
                continue;
            }
            let Some((store, owner_email)) = self.owner_of(subscription.store_id).await? else {
                continue;
            };
            let (subject, html) = trial_ending_email(
                &self.settings.app_origin,
                &store.name,
                subscription.days_until_expiration(now),
            );
            sent += self.send(&owner_email, &subject, &html).await;
        }
        info!(sent, "Sent trial ending reminders");
        Ok(sent)
    }

    /// Reminds owners about overdue invoices once they are `days` past due.
    #[instrument(skip(self))]
    pub async fn send_overdue_invoice_reminders(&self, days: i64) -> AppResult<usize> {
        let now = Utc::now().naive_utc();
        let mut sent = 0;
        for invoice in self
            .invoice_repo
            .list_by_status(InvoiceStatus::Overdue)
            .await?
        {
            let remind_at = invoice.due_at + ChronoDuration::days(days);
            if remind_at > now || remind_at <= now - self.settings.interval {
                continue;
            }
            let Some((store, owner_email)) = self.owner_of(invoice.store_id).await? else {
                continue;
            };
            let (subject, html) = invoice_overdue_email(
                &self.settings.app_origin,
                &store.name,
                &invoice.invoice_number,
                invoice.amount_cents,
                invoice.due_at,
            );
            sent += self.send(&owner_email, &subject, &html).await;
        }
        info!(sent, "Sent overdue invoice reminders");
        Ok(sent)
    }

    /// Alerts owners whose product usage reached `threshold` (a fraction) of the plan.
    #[instrument(skip(self))]
    pub async fn send_limit_approaching_alerts(&self, threshold: f64) -> AppResult<usize> {
        let now = Utc::now().naive_utc();
        let mut sent = 0;
        for subscription in self.subscriptions.list_by_status(&LIVE).await? {
            if !subscription.is_active(now) {
                continue;
            }
            let Some(plan) = self.plans.get_by_id(subscription.plan_id).await? else {
                warn!(subscription_id = %subscription.id, "Subscription references a missing plan");
                continue;
            };
            let used = self
                .usage
                .usage_percentage(
                    subscription.store_id,
                    MetricType::ProductCount,
                    i64::from(plan.max_products),
                )
                .await?;
            if used < threshold {
                continue;
            }
            let Some((store, owner_email)) = self.owner_of(subscription.store_id).await? else {
                continue;
            };
            let (subject, html) = usage_limit_email(&self.settings.app_origin, &store.name, used);
            sent += self.send(&owner_email, &subject, &html).await;
        }
        info!(sent, "Sent usage limit alerts");
        Ok(sent)
    }

    // ========================================================================
    // Usage
    // ========================================================================

    /// Recounts products per store into the `product_count` metric.
    #[instrument(skip(self))]
    pub async fn update_all_usage_metrics(&self) -> AppResult<usize> {
        let mut updated = 0;
        for store in self.stores.list_all().await? {
            let count = self.products.count_by_store(store.id).await?;
            self.usage
                .set(store.id, MetricType::ProductCount, count)
                .await?;
            updated += 1;
        }
        info!(updated, "Recounted product usage");
        Ok(updated)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// True once per run: when `moment - days` fell inside the last run interval.
    fn due_for_reminder(&self, moment: NaiveDateTime, now: NaiveDateTime, days: i64) -> bool {
        let remind_at = moment - ChronoDuration::days(days);
        remind_at <= now && remind_at > now - self.settings.interval
    }

    async fn owner_of(&self, store_id: Uuid) -> AppResult<Option<(Store, String)>> {
        let Some(store) = self.stores.get_by_id(store_id).await? else {
            return Ok(None);
        };
        let owner = self.users.get_by_id(store.owner_id).await?;
        Ok(owner.map(|u| (store, u.email)))
    }

    async fn send(&self, to: &str, subject: &str, html: &str) -> usize {
        match self.email.send(to, subject, html).await {
            Ok(()) => 1,
            Err(e) => {
                error!(error = ?e, "Failed to send reminder email");
                0
            }
        }
    }
}

fn logged<T: Default>(step: &str, result: AppResult<T>) -> T {
    result.unwrap_or_else(|e: AppError| {
        error!(step, error = ?e, "Subscription maintenance step failed");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::{authorization::StoreAccess, invitation::InvitationSettings};
    use crate::domain::entities::{
        invoice::SubscriptionInvoice, product::Product, store_subscription::StoreSubscription,
        subscription_plan::SubscriptionPlan, user::User,
    };
    use crate::test_utils::{
        InMemoryEmailSender, InMemoryInvitationRepo, InMemoryInvoiceRepo, InMemoryPlanRepo,
        InMemoryProductRepo, InMemoryStoreRepo, InMemoryStoreRoleRepo, InMemorySubscriptionRepo,
        InMemoryUsageMetricRepo, InMemoryUserRepo, create_test_invoice, create_test_plan,
        create_test_product, create_test_store, create_test_subscription, create_test_user,
    };
    use secrecy::SecretString;

    #[derive(Default)]
    struct Seed {
        subscriptions: Vec<StoreSubscription>,
        invoices: Vec<SubscriptionInvoice>,
        products: Vec<Product>,
    }

    struct Fixture {
        owner: User,
        store: Store,
        subscriptions: Arc<InMemorySubscriptionRepo>,
        invoices: Arc<InMemoryInvoiceRepo>,
        email: Arc<InMemoryEmailSender>,
        usage: UsageUseCases,
        scheduler: SubscriptionScheduler,
    }

    fn fixture(seed: impl FnOnce(&Store, &SubscriptionPlan) -> Seed) -> Fixture {
        let owner = create_test_user(|_| {});
        let store = create_test_store(owner.id, |_| {});
        let plan = create_test_plan(|p| p.max_products = 10);
        let seed = seed(&store, &plan);

        let subscriptions = Arc::new(InMemorySubscriptionRepo::with_subscriptions(seed.subscriptions));
        let plans = Arc::new(InMemoryPlanRepo::with_plans(vec![plan]));
        let invoice_repo = Arc::new(InMemoryInvoiceRepo::with_invoices(seed.invoices));
        let stores = Arc::new(InMemoryStoreRepo::with_stores(vec![store.clone()]));
        let users = Arc::new(InMemoryUserRepo::with_users(vec![owner.clone()]));
        let roles = Arc::new(InMemoryStoreRoleRepo::new());
        let products = Arc::new(InMemoryProductRepo::with_products(seed.products));
        let email = Arc::new(InMemoryEmailSender::new());
        let access = StoreAccess::new(stores.clone(), roles.clone());

        let usage = UsageUseCases::new(
            Arc::new(InMemoryUsageMetricRepo::new()),
            subscriptions.clone(),
            plans.clone(),
            access.clone(),
        );
        let invoice_uc = InvoiceUseCases::new(invoice_repo.clone(), plans.clone(), access.clone());
        let lifecycle = SubscriptionUseCases::new(
            subscriptions.clone(),
            plans.clone(),
            invoice_uc.clone(),
            usage.clone(),
            access.clone(),
            14,
        );
        let invitations = InvitationUseCases::new(
            Arc::new(InMemoryInvitationRepo::new()),
            access,
            roles,
            users.clone(),
            stores.clone(),
            email.clone(),
            InvitationSettings {
                secret: SecretString::from("invitation-secret"),
                ttl_days: 7,
                app_origin: "https://app.shopx.store".into(),
            },
        );
        let scheduler = SubscriptionScheduler::new(
            SchedulerRepos {
                subscriptions: subscriptions.clone(),
                plans,
                invoices: invoice_repo.clone(),
                stores,
                users,
                products,
            },
            lifecycle,
            invoice_uc,
            usage.clone(),
            invitations,
            email.clone(),
            SchedulerSettings {
                app_origin: "https://app.shopx.store".into(),
                reminder_days: 3,
                interval: ChronoDuration::hours(1),
            },
        );

        Fixture {
            owner,
            store,
            subscriptions,
            invoices: invoice_repo,
            email,
            usage,
            scheduler,
        }
    }

    fn status_of(f: &Fixture, id: Uuid) -> SubscriptionStatus {
        f.subscriptions
            .get_all()
            .into_iter()
            .find(|s| s.id == id)
            .map(|s| s.status)
            .unwrap()
    }

    #[tokio::test]
    async fn expired_trials_convert_and_lapsed_subscriptions_expire() {
        let now = Utc::now().naive_utc();
        let trial = Uuid::new_v4();
        let lapsed = Uuid::new_v4();
        let f = fixture(|store, plan| Seed {
            subscriptions: vec![
                create_test_subscription(store.id, plan.id, |s| {
                    s.id = trial;
                    s.status = SubscriptionStatus::Trial;
                    s.trial_end_date = Some(now - ChronoDuration::minutes(10));
                }),
                create_test_subscription(Uuid::new_v4(), plan.id, |s| {
                    s.id = lapsed;
                    s.end_date = now - ChronoDuration::days(2);
                    s.auto_renew = false;
                }),
            ],
            ..Default::default()
        });

        let expired = f.scheduler.process_expirations().await.unwrap();

        assert_eq!(expired, 1);
        assert_eq!(status_of(&f, trial), SubscriptionStatus::Active);
        assert_eq!(status_of(&f, lapsed), SubscriptionStatus::Expired);
        assert_eq!(f.invoices.get_all().len(), 1);
    }

    #[tokio::test]
    async fn pending_cancellations_complete_after_period_end() {
        let now = Utc::now().naive_utc();
        let ended = Uuid::new_v4();
        let running = Uuid::new_v4();
        let f = fixture(|store, plan| Seed {
            subscriptions: vec![
                create_test_subscription(store.id, plan.id, |s| {
                    s.id = ended;
                    s.canceled_at = Some(now - ChronoDuration::days(10));
                    s.auto_renew = false;
                    s.end_date = now - ChronoDuration::minutes(1);
                }),
                create_test_subscription(Uuid::new_v4(), plan.id, |s| {
                    s.id = running;
                    s.canceled_at = Some(now);
                    s.auto_renew = false;
                }),
            ],
            ..Default::default()
        });

        assert_eq!(f.scheduler.process_pending_cancellations().await.unwrap(), 1);
        assert_eq!(status_of(&f, ended), SubscriptionStatus::Expired);
        assert_eq!(status_of(&f, running), SubscriptionStatus::Active);
        // Not picked up as a plain expiration either.
        assert_eq!(f.scheduler.process_expirations().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn subscriptions_ending_this_hour_renew() {
        let now = Utc::now().naive_utc();
        let f = fixture(|store, plan| Seed {
            subscriptions: vec![create_test_subscription(store.id, plan.id, |s| {
                s.end_date = now + ChronoDuration::minutes(30);
            })],
            ..Default::default()
        });

        assert_eq!(f.scheduler.process_auto_renewals().await.unwrap(), 1);
        let renewed = &f.subscriptions.get_all()[0];
        assert!(renewed.end_date > now + ChronoDuration::days(27));
        assert!(f.invoices.get_all()[0].is_renewal);
    }

    #[tokio::test]
    async fn missed_renewal_window_still_renews_instead_of_expiring() {
        let now = Utc::now().naive_utc();
        let f = fixture(|store, plan| Seed {
            subscriptions: vec![create_test_subscription(store.id, plan.id, |s| {
                s.end_date = now - ChronoDuration::hours(2);
            })],
            ..Default::default()
        });

        let report = f.scheduler.run_all().await;

        assert_eq!(report.renewed, 1);
        assert_eq!(report.expired, 0);
        let renewed = &f.subscriptions.get_all()[0];
        assert_eq!(renewed.status, SubscriptionStatus::Active);
        assert!(renewed.start_date >= now);
        assert!(renewed.is_active(Utc::now().naive_utc()));
    }

    #[tokio::test]
    async fn overdue_invoices_are_marked_and_owner_reminded() {
        let now = Utc::now().naive_utc();
        let f = fixture(|store, _| Seed {
            invoices: vec![create_test_invoice(store.id, |i| {
                i.due_at = now - ChronoDuration::days(3) - ChronoDuration::minutes(5);
            })],
            ..Default::default()
        });

        assert_eq!(f.scheduler.mark_overdue_invoices().await.unwrap(), 1);
        assert_eq!(f.invoices.get_all()[0].status, InvoiceStatus::Overdue);

        assert_eq!(f.scheduler.send_overdue_invoice_reminders(3).await.unwrap(), 1);
        assert_eq!(f.scheduler.send_overdue_invoice_reminders(1).await.unwrap(), 0);
        assert_eq!(f.email.sent()[0].to, f.owner.email);
    }

    #[tokio::test]
    async fn trial_reminder_goes_to_store_owner_once() {
        let now = Utc::now().naive_utc();
        let f = fixture(|store, plan| Seed {
            subscriptions: vec![create_test_subscription(store.id, plan.id, |s| {
                s.status = SubscriptionStatus::Trial;
                s.trial_end_date = Some(now + ChronoDuration::days(3) - ChronoDuration::minutes(10));
            })],
            ..Default::default()
        });

        assert_eq!(f.scheduler.send_trial_ending_reminders(3).await.unwrap(), 1);
        assert_eq!(f.scheduler.send_trial_ending_reminders(5).await.unwrap(), 0);
        let sent = f.email.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, f.owner.email);
        assert!(sent[0].subject.contains(&f.store.name));
    }

    #[tokio::test]
    async fn recount_feeds_limit_alerts() {
        let f = fixture(|store, plan| Seed {
            subscriptions: vec![create_test_subscription(store.id, plan.id, |_| {})],
            products: (0..9).map(|_| create_test_product(store.id, |_| {})).collect(),
            ..Default::default()
        });

        assert_eq!(f.scheduler.send_limit_approaching_alerts(0.8).await.unwrap(), 0);
        assert_eq!(f.scheduler.update_all_usage_metrics().await.unwrap(), 1);
        assert_eq!(
            f.usage.get_value(f.store.id, MetricType::ProductCount).await.unwrap(),
            9
        );
        assert_eq!(f.scheduler.send_limit_approaching_alerts(0.8).await.unwrap(), 1);
        assert!(f.email.sent()[0].subject.contains("90%"));
    }

    #[tokio::test]
    async fn run_all_reports_each_step() {
        let now = Utc::now().naive_utc();
        let f = fixture(|store, plan| Seed {
            subscriptions: vec![create_test_subscription(store.id, plan.id, |s| {
                s.end_date = now + ChronoDuration::minutes(20);
            })],
            ..Default::default()
        });

        let report = f.scheduler.run_all().await;

        assert_eq!(report.renewed, 1);
        assert_eq!(report.expired, 0);
        assert_eq!(report.usage_recounted, 1);
        assert_eq!(report.invitations_expired, 0);
    }
}
