use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use rand::Rng;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::app_error::{AppError, AppResult};
use crate::application::use_cases::{authorization::StoreAccess, subscription_plan::PlanRepo};
use crate::domain::entities::{
    invoice::{InvoiceStatus, SubscriptionInvoice},
    store_role::StoreRoleType,
    store_subscription::StoreSubscription,
};

pub const INVOICE_DUE_DAYS: i64 = 7;
const MAX_NUMBER_ATTEMPTS: usize = 20;

#[async_trait]
pub trait InvoiceRepo: Send + Sync {
    async fn create(&self, invoice: &SubscriptionInvoice) -> AppResult<SubscriptionInvoice>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionInvoice>>;
    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<SubscriptionInvoice>>;
    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<SubscriptionInvoice>>;
    async fn list_by_status(&self, status: InvoiceStatus) -> AppResult<Vec<SubscriptionInvoice>>;
    async fn list_paid_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AppResult<Vec<SubscriptionInvoice>>;
    async fn list_issued_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AppResult<Vec<SubscriptionInvoice>>;
    async fn update(&self, invoice: &SubscriptionInvoice) -> AppResult<SubscriptionInvoice>;
    async fn invoice_number_exists(&self, number: &str) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct InvoiceUseCases {
    invoices: Arc<dyn InvoiceRepo>,
    plans: Arc<dyn PlanRepo>,
    access: StoreAccess,
}

impl InvoiceUseCases {
    pub fn new(
        invoices: Arc<dyn InvoiceRepo>,
        plans: Arc<dyn PlanRepo>,
        access: StoreAccess,
    ) -> Self {
        Self {
            invoices,
            plans,
            access,
        }
    }

    // ========================================================================
    // Generation
    // ========================================================================

    #[instrument(skip(self, subscription), fields(subscription_id = %subscription.id))]
    pub async fn generate(
        &self,
        subscription: &StoreSubscription,
        amount_cents: i64,
        due_at: NaiveDateTime,
    ) -> AppResult<SubscriptionInvoice> {
        self.create_invoice(subscription, amount_cents, due_at, false, None)
            .await
    }

    #[instrument(skip(self, subscription), fields(subscription_id = %subscription.id))]
    pub async fn generate_renewal(&self, subscription: &StoreSubscription) -> AppResult<SubscriptionInvoice> {
        let plan = self
            .plans
            .get_by_id(subscription.plan_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let amount = plan.price_for(subscription.billing_cycle);
        let due_at = Utc::now().naive_utc() + ChronoDuration::days(INVOICE_DUE_DAYS);
        let notes = format!("Renewal invoice for subscription #{}", subscription.id);
        self.create_invoice(subscription, amount, due_at, true, Some(notes))
            .await
    }

    async fn create_invoice(
        &self,
        subscription: &StoreSubscription,
        amount_cents: i64,
        due_at: NaiveDateTime,
        is_renewal: bool,
        notes: Option<String>,
    ) -> AppResult<SubscriptionInvoice> {
        if amount_cents < 0 {
            return Err(AppError::InvalidInput("Invoice amount cannot be negative".into()));
        }
        let now = Utc::now().naive_utc();
        if due_at <= now {
            return Err(AppError::InvalidInput("Invoice due date must be in the future".into()));
        }

        let invoice = SubscriptionInvoice {
            id: Uuid::new_v4(),
            subscription_id: subscription.id,
            store_id: subscription.store_id,
            invoice_number: self.next_invoice_number(now).await?,
            amount_cents,
            status: InvoiceStatus::Pending,
            issued_at: now,
            due_at,
            paid_at: None,
            payment_method: None,
            is_renewal,
            notes,
            created_at: Some(now),
        };
        let invoice = self.invoices.create(&invoice).await?;
        info!(invoice_number = %invoice.invoice_number, amount_cents, "Invoice issued");
        Ok(invoice)
    }

    async fn next_invoice_number(&self, now: NaiveDateTime) -> AppResult<String> {
        for _ in 0..MAX_NUMBER_ATTEMPTS {
            let candidate = invoice_number(now, rand::thread_rng().gen_range(0..10_000));
            if !self.invoices.invoice_number_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(AppError::Internal("could not allocate an invoice number".into()))
    }

    // ========================================================================
    // State changes
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn mark_paid(
        &self,
        invoice_id: Uuid,
        payment_method: &str,
        paid_at: Option<NaiveDateTime>,
    ) -> AppResult<SubscriptionInvoice> {
        let mut invoice = self.load(invoice_id).await?;
        match invoice.status {
            InvoiceStatus::Paid => {
                return Err(AppError::InvalidInput("Invoice is already paid".into()));
            }
            InvoiceStatus::Canceled => {
                return Err(AppError::InvalidInput("Canceled invoices cannot be paid".into()));
            }
            InvoiceStatus::Pending | InvoiceStatus::Overdue => {}
        }
        invoice.status = InvoiceStatus::Paid;
        invoice.paid_at = Some(paid_at.unwrap_or_else(|| Utc::now().naive_utc()));
        invoice.payment_method = Some(payment_method.to_string());
        self.invoices.update(&invoice).await
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, invoice_id: Uuid, reason: &str) -> AppResult<SubscriptionInvoice> {
        let mut invoice = self.load(invoice_id).await?;
        if invoice.status == InvoiceStatus::Paid {
            return Err(AppError::InvalidInput("Paid invoices cannot be canceled".into()));
        }
        invoice.status = InvoiceStatus::Canceled;
        invoice.notes = Some(match invoice.notes.take() {
            Some(existing) => format!("{existing}\nCanceled: {reason}"),
            None => format!("Canceled: {reason}"),
        });
        self.invoices.update(&invoice).await
    }

    pub async fn update_status(&self, invoice_id: Uuid, status: InvoiceStatus) -> AppResult<SubscriptionInvoice> {
        let mut invoice = self.load(invoice_id).await?;
        invoice.status = status;
        self.invoices.update(&invoice).await
    }

    // ========================================================================
    // Queries
    // ========================================================================

    #[instrument(skip(self))]
    pub async fn list_for_store(&self, user_id: Uuid, store_id: Uuid) -> AppResult<Vec<SubscriptionInvoice>> {
        self.access
            .require_store_role(user_id, store_id, StoreRoleType::Staff)
            .await?;
        let mut invoices = self.invoices.list_by_store(store_id).await?;
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(invoices)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, user_id: Uuid, invoice_id: Uuid) -> AppResult<SubscriptionInvoice> {
        let invoice = self.load(invoice_id).await?;
        self.access
            .require_store_role(user_id, invoice.store_id, StoreRoleType::Staff)
            .await?;
        Ok(invoice)
    }

    /// Owner-initiated payment of one of the store's invoices.
    #[instrument(skip(self))]
    pub async fn pay(&self, user_id: Uuid, invoice_id: Uuid, payment_method: &str) -> AppResult<SubscriptionInvoice> {
        let invoice = self.load(invoice_id).await?;
        self.access
            .require_store_role(user_id, invoice.store_id, StoreRoleType::Owner)
            .await?;
        let paid = self.mark_paid(invoice_id, payment_method, None).await?;
        info!(invoice_id = %paid.id, subscription_id = %paid.subscription_id, "Invoice paid");
        Ok(paid)
    }

    /// Pending invoices whose due date passed more than `days` ago.
    pub async fn overdue(&self, days: i64) -> AppResult<Vec<SubscriptionInvoice>> {
        let cutoff = Utc::now().naive_utc() - ChronoDuration::days(days);
        Ok(self
            .invoices
            .list_by_status(InvoiceStatus::Pending)
            .await?
            .into_iter()
            .filter(|i| i.due_at < cutoff)
            .collect())
    }

    pub async fn total_paid_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> AppResult<i64> {
        Ok(self
            .invoices
            .list_paid_between(from, to)
            .await?
            .iter()
            .map(|i| i.amount_cents)
            .sum())
    }

    async fn load(&self, invoice_id: Uuid) -> AppResult<SubscriptionInvoice> {
        self.invoices
            .get_by_id(invoice_id)
            .await?
            .ok_or(AppError::NotFound)
    }
}

/// `INV-YYYYMMDD-NNNN`.
pub fn invoice_number(issued_at: NaiveDateTime, sequence: u32) -> String {
    format!("INV-{}-{:04}", issued_at.format("%Y%m%d"), sequence % 10_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::store::Store;
    use crate::test_utils::{
        InMemoryInvoiceRepo, InMemoryPlanRepo, InMemoryStoreRepo, InMemoryStoreRoleRepo,
        create_test_invoice, create_test_plan, create_test_store,
        create_test_subscription,
    };

    fn use_cases(stores: Vec<Store>, invoices: Vec<SubscriptionInvoice>) -> InvoiceUseCases {
        let stores = Arc::new(InMemoryStoreRepo::with_stores(stores));
        InvoiceUseCases::new(
            Arc::new(InMemoryInvoiceRepo::with_invoices(invoices)),
            Arc::new(InMemoryPlanRepo::new()),
            StoreAccess::new(stores, Arc::new(InMemoryStoreRoleRepo::new())),
        )
    }

    #[test]
    fn invoice_numbers_are_zero_padded() {
        let at = chrono::NaiveDate::from_ymd_opt(2025, 3, 9)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(invoice_number(at, 42), "INV-20250309-0042");
    }

    #[tokio::test]
    async fn generate_validates_amount_and_due_date() {
        let uc = use_cases(vec![], vec![]);
        let sub = create_test_subscription(Uuid::new_v4(), Uuid::new_v4(), |_| {});
        let now = Utc::now().naive_utc();

        assert!(uc.generate(&sub, -1, now + ChronoDuration::days(1)).await.is_err());
        assert!(uc.generate(&sub, 100, now - ChronoDuration::days(1)).await.is_err());

        let invoice = uc.generate(&sub, 1900, now + ChronoDuration::days(7)).await.unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert!(invoice.invoice_number.starts_with("INV-"));
        assert_eq!(invoice.invoice_number.len(), "INV-20250101-0000".len());
    }

    #[tokio::test]
    async fn renewal_invoice_uses_cycle_price() {
        let plan = create_test_plan(|p| p.yearly_price_cents = 19_000);
        let sub = create_test_subscription(Uuid::new_v4(), plan.id, |s| {
            s.billing_cycle = crate::domain::entities::subscription_plan::BillingCycle::Yearly;
        });
        let uc = InvoiceUseCases::new(
            Arc::new(InMemoryInvoiceRepo::new()),
            Arc::new(InMemoryPlanRepo::with_plans(vec![plan])),
            StoreAccess::new(Arc::new(InMemoryStoreRepo::new()), Arc::new(InMemoryStoreRoleRepo::new())),
        );

        let invoice = uc.generate_renewal(&sub).await.unwrap();
        assert_eq!(invoice.amount_cents, 19_000);
        assert!(invoice.is_renewal);
        assert_eq!(
            invoice.notes.as_deref(),
            Some(format!("Renewal invoice for subscription #{}", sub.id).as_str())
        );
    }

    #[tokio::test]
    async fn paid_invoices_cannot_be_paid_or_canceled_again() {
        let invoice = create_test_invoice(Uuid::new_v4(), |_| {});
        let uc = use_cases(vec![], vec![invoice.clone()]);

        let paid = uc.mark_paid(invoice.id, "card", None).await.unwrap();
        assert!(paid.is_paid());
        assert!(uc.mark_paid(invoice.id, "card", None).await.is_err());
        assert!(uc.cancel(invoice.id, "mistake").await.is_err());
    }

    #[tokio::test]
    async fn canceled_invoice_cannot_be_paid() {
        let invoice = create_test_invoice(Uuid::new_v4(), |_| {});
        let uc = use_cases(vec![], vec![invoice.clone()]);

        let canceled = uc.cancel(invoice.id, "duplicate").await.unwrap();
        assert_eq!(canceled.notes.as_deref(), Some("Canceled: duplicate"));
        assert!(uc.mark_paid(invoice.id, "card", None).await.is_err());
    }

    #[tokio::test]
    async fn only_owner_pays_invoices() {
        let owner = Uuid::new_v4();
        let store = create_test_store(owner, |_| {});
        let invoice = create_test_invoice(store.id, |_| {});
        let uc = use_cases(vec![store], vec![invoice.clone()]);

        assert!(matches!(
            uc.pay(Uuid::new_v4(), invoice.id, "card").await,
            Err(AppError::Forbidden)
        ));
        let paid = uc.pay(owner, invoice.id, "card").await.unwrap();
        assert_eq!(paid.payment_method.as_deref(), Some("card"));
    }

    #[tokio::test]
    async fn overdue_respects_grace_days() {
        let now = Utc::now().naive_utc();
        let long_overdue = create_test_invoice(Uuid::new_v4(), |i| i.due_at = now - ChronoDuration::days(10));
        let recently_due = create_test_invoice(Uuid::new_v4(), |i| i.due_at = now - ChronoDuration::days(1));
        let uc = use_cases(vec![], vec![long_overdue.clone(), recently_due]);

        let overdue = uc.overdue(3).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, long_overdue.id);
    }
}
