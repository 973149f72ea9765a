//! The record reconciliation engine.
//!
//! Executes in strict dependency order: [`align`](align::align) joins the two
//! datasets and tags provenance, [`compare`](compare) evaluates individual
//! field rules, [`classify`](classify::classify_row) folds per-row outcomes,
//! and [`report`](report::reconcile) aggregates the four result sets.
//!
//! The engine is synchronous and lock-free: each run borrows its inputs
//! read-only and produces wholly new output, so runs against different file
//! pairs may execute concurrently without coordination.

use thiserror::Error;

use crate::core::types::Side;

pub mod align;
pub mod classify;
pub mod compare;
pub mod report;

/// Structural input errors, surfaced before any join work is attempted.
///
/// Errors local to one row or field never take this path; they are recovered
/// inside classification (see [`classify`]).
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("{side} dataset has no column named '{column}' to use as the identifier")]
    MissingIdColumn { side: Side, column: String },
}
