//! Error classification shared by every module

use serde::{Deserialize, Serialize};

/// How a caller should treat a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Bad input; nothing was written, never retried
    Validation,
    /// Operation not allowed in the current state; state untouched
    State,
    /// Stored data no longer matches its recomputation; critical alert
    Integrity,
    /// Optimistic-lock retries exhausted
    Concurrency,
    /// Referenced entity does not exist
    NotFound,
}
