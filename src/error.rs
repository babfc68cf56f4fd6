// =============================================================================
// Error taxonomy for the Polaris indicator engine
// =============================================================================
//
// Store failures abort the current operation and are surfaced to the command
// dispatcher; they never terminate the process. Reportable non-failures
// (nothing to update, already initialized, ...) are RecomputeOutcome variants
// in engine.rs, not errors.

use thiserror::Error;

/// Failures raised by a price or indicator store. Absence of data is not a
/// failure; stores report it as an empty result and the engine turns it into
/// a reportable outcome.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Failures surfaced by the recompute engine and command dispatch.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
