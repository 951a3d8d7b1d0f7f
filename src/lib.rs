//! Core of the itemlab resilience test target.
//!
//! This crate owns the in-memory item store and the simulations layered on
//! its lock. The HTTP surface lives in the `itemlab-server` crate, which calls
//! into the types re-exported here.
//!
//! - [`ItemStore`]: CRUD, search and bulk operations, serialized on one
//!   [`StoreLock`].
//! - [`BlockSimulator`]: holds that same lock from a background task to
//!   emulate a stuck worker; [`BlockSimulator::block_status`] never waits on it.
//! - [`simulate_timeout`]: a plain timed wait for exercising client timeouts.
//!
//! ```rust
//! use itemlab::{BlockSimulator, ItemStore, NewItem, SimulationConfig, StoreConfig, StoreLock};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), itemlab::StoreError> {
//! let lock = StoreLock::new();
//! let store = ItemStore::new(lock.clone(), StoreConfig::default());
//! let simulator = BlockSimulator::new(lock, SimulationConfig::default());
//!
//! let item = store.create(NewItem::new("Widget", 4.5)).await?;
//! assert_eq!(store.get(&item.id).await?.name, "Widget");
//! assert!(!simulator.block_status().is_blocked());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod model;
pub mod simulate;
pub mod store;

pub use config::{SimulationConfig, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use model::{BulkFailure, BulkOutcome, Item, ItemPatch, NewItem, SearchFilter};
pub use simulate::{BlockSimulator, BlockStatus, BlockTicket, TimeoutReport, simulate_timeout};
pub use store::{ItemStore, StoreLock, StoreStats};
