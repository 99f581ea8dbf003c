// SPDX-License-Identifier: MIT

//! The error taxonomy surfaced to drivers (§6 of the design).

use thiserror::Error;

/// Every failure mode an engine operation can produce.
///
/// No exit codes are prescribed here — that is the driver's concern.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("platform '{0}' does not exist")]
    NotFound(String),

    #[error("platform '{0}' already exists")]
    AlreadyExists(String),

    #[error("provider '{0}' is not available")]
    NotAvailable(String),

    #[error("task was cancelled")]
    TaskCancelled,

    #[error("timed out waiting for task result")]
    Timeout,

    #[error("failed to read engine state: {0}")]
    ReadError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Opaque error bubbled up from a provider operation. Providers are not
    /// required to expose a typed error, only a diagnostic message.
    #[error("provider error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
