pub mod analytics;
pub mod authorization;
pub mod catalog;
pub mod collection;
pub mod invitation;
pub mod invoice;
pub mod product;
pub mod session;
pub mod staff;
pub mod store;
pub mod subscription;
pub mod subscription_plan;
pub mod subscription_scheduler;
pub mod token_revocation;
pub mod usage;
pub mod user;
pub mod visitor;
