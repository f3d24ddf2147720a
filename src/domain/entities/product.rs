use std::collections::HashMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub field_name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub store_id: Uuid,
    pub product_type_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub base_price_cents: i64,
    pub sale_price_cents: Option<i64>,
    pub is_active: bool,
    pub manage_stock: bool,
    pub stock_threshold: Option<i32>,
    pub tags: Vec<String>,
    pub field_values: Vec<FieldValue>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub base_price_cents: Option<i64>,
    pub sale_price_cents: Option<i64>,
    pub manage_stock: bool,
    pub stock_threshold: Option<i32>,
    pub option_values: HashMap<String, String>,
    pub is_active: bool,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}
