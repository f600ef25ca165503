// =====================================================
// DATABASE DISPATCHER MODULE
// Connections, reads, catalog inspection, casting and writes
// =====================================================

pub mod sql_utils;

pub mod connections;
pub use connections::*;

pub mod query_execution;
pub use query_execution::*;

pub mod metadata;
pub use metadata::*;

pub mod type_reconciler;
pub use type_reconciler::{build_casting_plan, reconcile, CastRule, CastingPlan};

pub mod data_transfer;
pub use data_transfer::*;

#[cfg(test)]
pub(crate) mod testing;
