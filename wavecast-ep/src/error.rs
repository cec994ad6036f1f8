//! Error taxonomy for the episode producer
//!
//! Propagation policy:
//! - provider errors are contained to the failing call site (one chunk, one
//!   report) and classified transient/permanent for the retry policy;
//! - stage errors are contained to their category pipeline;
//! - only configuration errors abort the whole run, before any category runs.

use thiserror::Error;

/// Error from an external provider call (text generation, speech synthesis,
/// feed fetch, delivery)
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Quota or rate-limit condition: retried with fixed backoff
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// Bad input, auth failure, or other non-retryable condition
    #[error("Permanent provider error: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// Classify an HTTP response status the way every provider client does:
    /// 429 and 5xx are transient, other failures are permanent.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 || status >= 500 {
            ProviderError::Transient(format!("HTTP {}: {}", status, body))
        } else {
            ProviderError::Permanent(format!("HTTP {}: {}", status, body))
        }
    }
}

/// Failure of one pipeline stage, fatal for its category only
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    /// Expected artifact missing from disk (data integrity)
    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Assembly failed: {0}")]
    AssemblyFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] wavecast_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ProviderError::from_status(429, String::new()).is_transient());
        assert!(ProviderError::from_status(503, String::new()).is_transient());
        assert!(!ProviderError::from_status(400, String::new()).is_transient());
        assert!(!ProviderError::from_status(401, String::new()).is_transient());
        assert!(!ProviderError::from_status(404, String::new()).is_transient());
    }
}
