//! Test utilities: in-memory repositories, factories and an `AppState` builder.
//!
//! Compiled only for tests. Mocks keep their rows in `Mutex<HashMap<..>>` and
//! expose them as public fields so tests can seed and inspect state directly.

mod account_mocks;
mod app_state_builder;
mod billing_mocks;
mod catalog_mocks;
mod factories;
mod store_mocks;

pub use account_mocks::*;
pub use app_state_builder::*;
pub use billing_mocks::*;
pub use catalog_mocks::*;
pub use factories::*;
pub use store_mocks::*;
