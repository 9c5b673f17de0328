//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Pipelines     │  │     Skips               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Upload         │  │  ConnectivityUnavailable│ │
//! │  │  MissingTermId  │  │  Download       │  │  CycleInProgress        │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  (not failures: the     │ │
//! │  │  ConfigLoad/Save│  │                 │  │   cycle simply didn't   │ │
//! │  └─────────────────┘  └─────────────────┘  │   run)                  │ │
//! │                                            └─────────────────────────┘ │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Storage      │  │     Sale        │                              │
//! │  │                 │  │                 │                              │
//! │  │  StorageError   │  │  CoreError      │                              │
//! │  │  (Local Store)  │  │  (cart rules)   │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Upload/Download failures leave local state untouched and are retried by
//! the next trigger. They never reach the register; the orchestrator turns
//! them into a status banner.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use till_core::CoreError;
use till_db::StorageError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Which network step a timeout or transport failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOperation {
    Upload,
    Download,
    Probe,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncOperation::Upload => "upload",
            SyncOperation::Download => "download",
            SyncOperation::Probe => "probe",
        })
    }
}

/// Sync error type covering all sync and sale-flow failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Terminal id missing from config.
    #[error("Terminal ID not configured. Set [terminal] id in sync.toml.")]
    MissingTerminalId,

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Pipeline Errors
    // =========================================================================
    /// Upload batch was not accepted. Every transaction is still pending.
    #[error("Upload failed: {0}")]
    Upload(String),

    /// Download did not complete. The cursor was not moved.
    #[error("Download failed: {0}")]
    Download(String),

    /// A network call exceeded the configured request timeout.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: SyncOperation,
        after: Duration,
    },

    // =========================================================================
    // Skips
    // =========================================================================
    /// Sync attempted while offline.
    #[error("Server unreachable, sync skipped")]
    ConnectivityUnavailable,

    /// Another cycle is already running.
    #[error("Sync cycle already in progress")]
    CycleInProgress,

    // =========================================================================
    // Local Errors
    // =========================================================================
    #[error("Local store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Sale rejected: {0}")]
    Sale(#[from] CoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if the next trigger may succeed without intervention.
    ///
    /// ## Retryable Errors
    /// - Upload / download failures (network, non-2xx, `success:false`)
    /// - Timeouts
    /// - Offline skips
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Upload(_)
                | SyncError::Download(_)
                | SyncError::Timeout { .. }
                | SyncError::ConnectivityUnavailable
                | SyncError::CycleInProgress
        )
    }

    /// True when the cycle did not run at all. Not a failure.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            SyncError::ConnectivityUnavailable | SyncError::CycleInProgress
        )
    }

    /// True for failures of the upload half of a cycle, timeouts included.
    pub fn is_upload(&self) -> bool {
        matches!(
            self,
            SyncError::Upload(_)
                | SyncError::Timeout {
                    operation: SyncOperation::Upload,
                    ..
                }
        )
    }

    /// True for failures of the download half of a cycle, timeouts included.
    pub fn is_download(&self) -> bool {
        matches!(
            self,
            SyncError::Download(_)
                | SyncError::Timeout {
                    operation: SyncOperation::Download,
                    ..
                }
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingTerminalId
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Upload("503".into()).is_retryable());
        assert!(SyncError::Download("connection refused".into()).is_retryable());
        assert!(SyncError::Timeout {
            operation: SyncOperation::Upload,
            after: Duration::from_secs(10),
        }
        .is_retryable());

        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::MissingTerminalId.is_retryable());
        assert!(!SyncError::Storage(StorageError::PoolExhausted).is_retryable());
    }

    #[test]
    fn test_timeouts_classified_by_operation() {
        let upload = SyncError::Timeout {
            operation: SyncOperation::Upload,
            after: Duration::from_secs(10),
        };
        let download = SyncError::Timeout {
            operation: SyncOperation::Download,
            after: Duration::from_secs(10),
        };

        assert!(upload.is_upload() && !upload.is_download());
        assert!(download.is_download() && !download.is_upload());
        assert_eq!(download.to_string(), "download timed out after 10s");
    }

    #[test]
    fn test_sub_second_timeout_keeps_its_duration() {
        let err = SyncError::Timeout {
            operation: SyncOperation::Probe,
            after: Duration::from_millis(500),
        };
        assert_eq!(err.to_string(), "probe timed out after 500ms");
    }

    #[test]
    fn test_skips_are_not_failures() {
        assert!(SyncError::ConnectivityUnavailable.is_skip());
        assert!(SyncError::CycleInProgress.is_skip());
        assert!(!SyncError::Upload("x".into()).is_skip());
    }

    #[test]
    fn test_storage_error_converts() {
        let err: SyncError = StorageError::PoolExhausted.into();
        assert!(matches!(err, SyncError::Storage(_)));
        assert!(!err.is_config_error());
    }
}
