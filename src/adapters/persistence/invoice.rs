use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::invoice::InvoiceRepo,
    domain::entities::invoice::{InvoiceStatus, SubscriptionInvoice},
};

fn row_to_invoice(row: sqlx::postgres::PgRow) -> SubscriptionInvoice {
    let status: String = row.get("status");

    SubscriptionInvoice {
        id: row.get("id"),
        subscription_id: row.get("subscription_id"),
        store_id: row.get("store_id"),
        invoice_number: row.get("invoice_number"),
        amount_cents: row.get("amount_cents"),
        status: InvoiceStatus::from_str(&status),
        issued_at: row.get("issued_at"),
        due_at: row.get("due_at"),
        paid_at: row.get("paid_at"),
        payment_method: row.get("payment_method"),
        is_renewal: row.get("is_renewal"),
        notes: row.get("notes"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, subscription_id, store_id, invoice_number, amount_cents, status,
    issued_at, due_at, paid_at, payment_method, is_renewal, notes, created_at
"#;

impl PostgresPersistence {
    async fn invoices_between(
        &self,
        column: &str,
        from: NaiveDateTime,
        to: NaiveDateTime,
        paid_only: bool,
    ) -> AppResult<Vec<SubscriptionInvoice>> {
        let status_filter = if paid_only { "AND status = 'paid'" } else { "" };
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscription_invoices WHERE {col} >= $1 AND {col} < $2 {} ORDER BY {col}",
            SELECT_COLS,
            status_filter,
            col = column
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_invoice).collect())
    }
}

#[async_trait]
impl InvoiceRepo for PostgresPersistence {
    async fn create(&self, invoice: &SubscriptionInvoice) -> AppResult<SubscriptionInvoice> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO subscription_invoices
                 (id, subscription_id, store_id, invoice_number, amount_cents, status,
                  issued_at, due_at, paid_at, payment_method, is_renewal, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(invoice.id)
        .bind(invoice.subscription_id)
        .bind(invoice.store_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.amount_cents)
        .bind(invoice.status.as_str())
        .bind(invoice.issued_at)
        .bind(invoice.due_at)
        .bind(invoice.paid_at)
        .bind(&invoice.payment_method)
        .bind(invoice.is_renewal)
        .bind(&invoice.notes)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_invoice(row))
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<SubscriptionInvoice>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscription_invoices WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_invoice))
    }

    async fn list_by_store(&self, store_id: Uuid) -> AppResult<Vec<SubscriptionInvoice>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscription_invoices WHERE store_id = $1 ORDER BY issued_at DESC",
            SELECT_COLS
        ))
        .bind(store_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_invoice).collect())
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<SubscriptionInvoice>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscription_invoices WHERE subscription_id = $1 ORDER BY issued_at DESC",
            SELECT_COLS
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_invoice).collect())
    }

    async fn list_by_status(&self, status: InvoiceStatus) -> AppResult<Vec<SubscriptionInvoice>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscription_invoices WHERE status = $1 ORDER BY due_at",
            SELECT_COLS
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_invoice).collect())
    }

    async fn list_paid_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AppResult<Vec<SubscriptionInvoice>> {
        self.invoices_between("paid_at", from, to, true).await
    }

    async fn list_issued_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> AppResult<Vec<SubscriptionInvoice>> {
        self.invoices_between("issued_at", from, to, false).await
    }

    async fn update(&self, invoice: &SubscriptionInvoice) -> AppResult<SubscriptionInvoice> {
        let row = sqlx::query(&format!(
            r#"UPDATE subscription_invoices SET
                 amount_cents = $2, status = $3, due_at = $4, paid_at = $5,
                 payment_method = $6, notes = $7
               WHERE id = $1
               RETURNING {}"#,
            SELECT_COLS
        ))
        .bind(invoice.id)
        .bind(invoice.amount_cents)
        .bind(invoice.status.as_str())
        .bind(invoice.due_at)
        .bind(invoice.paid_at)
        .bind(&invoice.payment_method)
        .bind(&invoice.notes)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        row.map(row_to_invoice).ok_or(AppError::NotFound)
    }

    async fn invoice_number_exists(&self, number: &str) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM subscription_invoices WHERE invoice_number = $1)",
        )
        .bind(number)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(exists.0)
    }
}
