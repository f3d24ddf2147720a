use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    ProductCount,
    ApiCalls,
    BandwidthUsage,
    StorageUsage,
}

impl MetricType {
    pub const ALL: [MetricType; 4] = [
        MetricType::ProductCount,
        MetricType::ApiCalls,
        MetricType::BandwidthUsage,
        MetricType::StorageUsage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::ProductCount => "product_count",
            MetricType::ApiCalls => "api_calls",
            MetricType::BandwidthUsage => "bandwidth_usage",
            MetricType::StorageUsage => "storage_usage",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "product_count" => Some(MetricType::ProductCount),
            "api_calls" => Some(MetricType::ApiCalls),
            "bandwidth_usage" => Some(MetricType::BandwidthUsage),
            "storage_usage" => Some(MetricType::StorageUsage),
            _ => None,
        }
    }
}

/// Kinds of plan limits that can be enforced before an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    Product,
    ApiCall,
    Storage,
    Bandwidth,
    User,
    Feature,
}

impl LimitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitType::Product => "product",
            LimitType::ApiCall => "api_call",
            LimitType::Storage => "storage",
            LimitType::Bandwidth => "bandwidth",
            LimitType::User => "user",
            LimitType::Feature => "feature",
        }
    }

    /// Usage metric counted for this limit, if any.
    pub fn metric(&self) -> Option<MetricType> {
        match self {
            LimitType::Product => Some(MetricType::ProductCount),
            LimitType::ApiCall => Some(MetricType::ApiCalls),
            LimitType::Storage => Some(MetricType::StorageUsage),
            LimitType::Bandwidth => Some(MetricType::BandwidthUsage),
            LimitType::User | LimitType::Feature => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageMetric {
    pub store_id: Uuid,
    pub metric_type: MetricType,
    pub count: i64,
    pub updated_at: Option<NaiveDateTime>,
}
