pub mod category;
pub mod collection;
pub mod invoice;
pub mod product;
pub mod product_type;
pub mod revoked_token;
pub mod session;
pub mod store;
pub mod store_invitation;
pub mod store_role;
pub mod store_subscription;
pub mod subscription_plan;
pub mod usage_metric;
pub mod user;
pub mod visitor;
