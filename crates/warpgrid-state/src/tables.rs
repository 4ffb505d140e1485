//! redb table definitions for the scheduler store.
//!
//! Both tables use `&str` keys and JSON `&[u8]` values.

use redb::TableDefinition;

/// Singleton scheduler metadata, keyed by well-known names.
pub const SCHEDULER: TableDefinition<&str, &[u8]> = TableDefinition::new("scheduler");

/// Task records keyed by task id.
pub const TASKS: TableDefinition<&str, &[u8]> = TableDefinition::new("tasks");

/// Key of the persisted framework id in [`SCHEDULER`].
pub const FRAMEWORK_ID_KEY: &str = "framework_id";
