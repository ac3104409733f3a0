//! [`TransformError`] and the user-facing [`ErrorCategory`] it maps to.

use std::fmt;

use thiserror::Error;

/// Reason recorded for a provider skipped because it has no credential.
pub const NOT_CONFIGURED: &str = "no API key configured";

// ---------------------------------------------------------------------------
// TransformError
// ---------------------------------------------------------------------------

/// Failure of one provider, or of the whole fallback chain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// Transport failure talking to the provider.
    #[error("{provider}: network failure: {message}")]
    Network { provider: String, message: String },

    /// The provider answered with JSON we could not use.
    #[error("{provider}: unexpected response: {message}")]
    SchemaMismatch { provider: String, message: String },

    /// Missing credential (`status: None`) or a non-2xx answer.
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable {
        provider: String,
        reason: String,
        status: Option<u16>,
    },

    /// The provider reported the job as failed.
    #[error("{provider} job failed: {message}")]
    JobFailed { provider: String, message: String },

    /// The poll budget ran out before a terminal status.
    #[error("{provider} job timed out after {attempts} status checks")]
    JobTimeout { provider: String, attempts: u32 },

    /// The job completed but its result carried no image.
    #[error("{provider}: no image in result")]
    NoImageInResult { provider: String },

    /// Every provider in the chain failed or was skipped.
    #[error("all image providers failed ({} attempted)", .failures.len())]
    AllProvidersExhausted { failures: Vec<TransformError> },
}

impl TransformError {
    pub fn not_configured(provider: impl Into<String>) -> Self {
        TransformError::ProviderUnavailable {
            provider: provider.into(),
            reason: NOT_CONFIGURED.into(),
            status: None,
        }
    }

    pub fn network(provider: impl Into<String>, e: impl fmt::Display) -> Self {
        TransformError::Network {
            provider: provider.into(),
            message: e.to_string(),
        }
    }

    /// Provider that produced this error; `None` for the aggregate.
    pub fn provider(&self) -> Option<&str> {
        match self {
            TransformError::Network { provider, .. }
            | TransformError::SchemaMismatch { provider, .. }
            | TransformError::ProviderUnavailable { provider, .. }
            | TransformError::JobFailed { provider, .. }
            | TransformError::JobTimeout { provider, .. }
            | TransformError::NoImageInResult { provider } => Some(provider),
            TransformError::AllProvidersExhausted { .. } => None,
        }
    }

    /// Provider skipped for lack of a credential.
    pub fn is_not_configured(&self) -> bool {
        matches!(self, TransformError::ProviderUnavailable { status: None, .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        match self {
            TransformError::ProviderUnavailable { status, .. } => *status == Some(401),
            TransformError::AllProvidersExhausted { failures } => {
                failures.iter().any(TransformError::is_unauthorized)
            }
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            TransformError::JobTimeout { .. } => true,
            TransformError::AllProvidersExhausted { failures } => {
                failures.iter().any(TransformError::is_timeout)
            }
            _ => false,
        }
    }

    /// Category shown to the user.
    ///
    /// Precedence: authorization, then timeout, then any provider-tagged
    /// failure.  A chain where every provider was skipped for a missing
    /// credential also asks the user to check their keys.
    pub fn category(&self) -> ErrorCategory {
        if self.is_unauthorized() {
            return ErrorCategory::CheckApiKeys;
        }
        match self {
            TransformError::AllProvidersExhausted { failures } => {
                if !failures.is_empty() && failures.iter().all(TransformError::is_not_configured) {
                    ErrorCategory::CheckApiKeys
                } else if self.is_timeout() {
                    ErrorCategory::TakingLonger
                } else if failures.iter().any(|f| f.provider().is_some()) {
                    ErrorCategory::ServiceBusy
                } else {
                    ErrorCategory::Generic
                }
            }
            e if e.is_not_configured() => ErrorCategory::CheckApiKeys,
            TransformError::JobTimeout { .. } => ErrorCategory::TakingLonger,
            _ => ErrorCategory::ServiceBusy,
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// User-facing classification of a failed transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    ServiceBusy,
    TakingLonger,
    CheckApiKeys,
    Generic,
}

impl ErrorCategory {
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCategory::ServiceBusy => {
                "Image transformation service is busy. Please try again in a moment."
            }
            ErrorCategory::TakingLonger => {
                "Transformation is taking longer than expected. Please try again."
            }
            ErrorCategory::CheckApiKeys => "API authentication failed. Please check your API keys.",
            ErrorCategory::Generic => {
                "Transformation failed. Please try again with a different style."
            }
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
