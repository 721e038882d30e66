//! Persistence for the order core.
//!
//! [`CommerceStore`] is the single transactional boundary: stock reservation,
//! order placement and every later order write go through it, so inventory
//! and order state always change together.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use domain::Version;
pub use error::{Result, StoreError};
pub use event::{EventEnvelope, EventId};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{CommerceStore, CommerceStoreExt, MAX_STOCK};
