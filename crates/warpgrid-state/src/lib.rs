//! warpgrid-state — embedded scheduler store for WarpGrid.
//!
//! Backed by [redb](https://docs.rs/redb), holds what a scheduler replica
//! needs to survive a restart or a leadership change: the framework id
//! assigned by the resource manager and the task records.
//!
//! # Architecture
//!
//! Values are JSON-serialized into redb's `&[u8]` value columns. Task
//! records written by older schedulers may lack fields newer code relies
//! on; [`SchedulerStore::backfill`] repairs them in one write transaction
//! when a replica takes leadership.
//!
//! The `SchedulerStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across threads.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::SchedulerStore;
pub use types::*;
