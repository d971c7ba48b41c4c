//! Error types for the Skylift deployment orchestrator.
//!
//! This module provides the error hierarchy for every stage of the
//! pipeline: parameter loading, resource provisioning, access-grant
//! propagation, network linking, application release, readiness polling,
//! and gateway registration.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Skylift orchestrator.
#[derive(Debug, Error)]
pub enum SkyliftError {
    /// Parameter document errors.
    #[error("Parameter error: {0}")]
    Params(#[from] ParamsError),

    /// Cloud control-plane errors.
    #[error("Control plane error: {0}")]
    Cloud(#[from] CloudError),

    /// Access-grant propagation errors.
    #[error("Role assignment error: {0}")]
    Rbac(#[from] RbacError),

    /// Network/DNS linking errors.
    #[error("Network link error: {0}")]
    Link(#[from] LinkError),

    /// Application release errors.
    #[error("Release error: {0}")]
    Release(#[from] ReleaseError),

    /// Readiness polling errors.
    #[error("Readiness error: {0}")]
    Readiness(#[from] ReadinessError),

    /// Gateway registration errors.
    #[error("Gateway registration error: {0}")]
    Gateway(#[from] GatewayError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Parameter document errors.
#[derive(Debug, Error)]
pub enum ParamsError {
    /// The parameters file was not found.
    #[error("Parameters file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The parameters file could not be parsed.
    #[error("Failed to parse parameters: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A required parameter is absent, null, or empty.
    #[error("Missing required parameter: {name}")]
    MissingRequired {
        /// Name of the missing parameter.
        name: String,
    },

    /// A parameter carries a value outside the supported scalar types.
    #[error("Parameter '{name}' has unsupported value type: {found}")]
    UnsupportedType {
        /// Name of the offending parameter.
        name: String,
        /// Description of the value found.
        found: String,
    },

    /// A parameter exists but with an unexpected scalar type.
    #[error("Parameter '{name}' is not a {expected}")]
    WrongType {
        /// Name of the parameter.
        name: String,
        /// The expected scalar type.
        expected: &'static str,
    },
}

/// Cloud control-plane errors.
#[derive(Debug, Error)]
pub enum CloudError {
    /// Authentication against the identity provider failed.
    #[error("Control plane authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// A control-plane request returned a non-success status.
    #[error("Control plane request failed: {status} - {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the control plane.
        message: String,
    },

    /// The control plane rate limited the request.
    #[error("Control plane rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network error reaching the control plane.
    #[error("Network error communicating with the control plane: {message}")]
    NetworkError {
        /// Description of the network error.
        message: String,
    },

    /// The control plane returned an unusable response body.
    #[error("Invalid response from the control plane: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },

    /// A converged resource did not expose an expected output.
    #[error("Resource '{resource}' returned no '{field}' output")]
    MissingOutput {
        /// Logical name of the resource.
        resource: String,
        /// Name of the absent output field.
        field: &'static str,
    },

    /// A later stage asked the output bag for a key no stage produced.
    #[error("No outputs recorded for resource '{resource}'")]
    UnknownResource {
        /// Logical name of the absent resource.
        resource: String,
    },

    /// Two provisioning calls tried to claim the same logical name.
    #[error("Outputs for resource '{resource}' were already recorded")]
    DuplicateResource {
        /// Logical name of the duplicated resource.
        resource: String,
    },
}

/// Access-grant propagation errors.
#[derive(Debug, Error)]
pub enum RbacError {
    /// A role-grant call failed for a specific resource.
    #[error("Failed to grant '{role}' on '{resource}': {reason}")]
    GrantFailed {
        /// Role that was being granted.
        role: String,
        /// Logical name of the target resource.
        resource: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The custom role definition could not be converged.
    #[error("Failed to converge custom role definition '{name}': {reason}")]
    DefinitionFailed {
        /// Name of the role definition.
        name: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Developer access was requested without an operator principal.
    #[error("Developer access requested but 'operator_object_id' is empty")]
    MissingOperator,
}

/// Network/DNS linking errors.
#[derive(Debug, Error)]
pub enum LinkError {
    /// A peering call failed.
    #[error("Failed to peer '{source_network}' to '{target}': {reason}")]
    PeeringFailed {
        /// Logical name of the source network.
        source_network: String,
        /// Logical name of the target network.
        target: String,
        /// Reason for the failure.
        reason: String,
    },

    /// A private-zone link call failed.
    #[error("Failed to link zone '{zone}' to network '{network}': {reason}")]
    ZoneLinkFailed {
        /// Name of the resolution zone.
        zone: String,
        /// Logical name of the network.
        network: String,
        /// Reason for the failure.
        reason: String,
    },
}

/// Application release errors.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// The release tool could not be invoked.
    #[error("Failed to invoke {tool}: {message}")]
    ToolUnavailable {
        /// The external tool (helm, kubectl).
        tool: &'static str,
        /// Description of the invocation failure.
        message: String,
    },

    /// The release tool exited with a failure status.
    #[error("{tool} exited with status {status}: {stderr}")]
    ToolFailed {
        /// The external tool (helm, kubectl).
        tool: &'static str,
        /// Process exit status.
        status: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The release values document could not be rendered.
    #[error("Failed to render release values: {message}")]
    ValuesRender {
        /// Description of the render failure.
        message: String,
    },

    /// Cluster credentials could not be materialized.
    #[error("Failed to write cluster credentials: {message}")]
    Credentials {
        /// Description of the credential failure.
        message: String,
    },
}

/// Readiness polling errors.
#[derive(Debug, Error)]
pub enum ReadinessError {
    /// The attempt budget ran out before the signal appeared.
    #[error("Timed out waiting for {what} after {attempts} attempts")]
    Timeout {
        /// Human-readable description of the awaited signal.
        what: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Polling was cancelled by the operator.
    #[error("Polling for {what} was cancelled")]
    Cancelled {
        /// Human-readable description of the awaited signal.
        what: String,
    },
}

/// Gateway registration errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The interface description could not be fetched from the backend.
    #[error("Failed to fetch interface description from {url}: {message}")]
    SpecFetch {
        /// URL of the interface-description endpoint.
        url: String,
        /// Description of the fetch failure.
        message: String,
    },

    /// The gateway rejected the API import.
    #[error("Gateway refused API '{api}': {reason}")]
    ImportRejected {
        /// Name of the API definition.
        api: String,
        /// Reason reported by the gateway.
        reason: String,
    },
}

/// Result type alias for Skylift operations.
pub type Result<T> = std::result::Result<T, SkyliftError>;

impl SkyliftError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable at the transport layer.
    ///
    /// Only transient control-plane conditions qualify; every stage-level
    /// failure is terminal for the run.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Cloud(CloudError::RateLimited { .. } | CloudError::NetworkError { .. })
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Cloud(CloudError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            Self::Cloud(CloudError::NetworkError { .. }) => Some(5),
            _ => None,
        }
    }
}

impl ParamsError {
    /// Creates a missing-required-parameter error.
    #[must_use]
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingRequired { name: name.into() }
    }
}

impl CloudError {
    /// Creates a request error from a status code and body.
    #[must_use]
    pub fn request(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_covers_only_transient_cloud_failures() {
        let rate_limited = SkyliftError::Cloud(CloudError::RateLimited {
            retry_after_secs: 30,
        });
        let network = SkyliftError::Cloud(CloudError::network("connection reset"));
        let missing = SkyliftError::Params(ParamsError::missing("subscription_id"));

        assert!(rate_limited.is_retryable());
        assert!(network.is_retryable());
        assert!(!missing.is_retryable());
        assert_eq!(rate_limited.retry_delay_secs(), Some(30));
        assert_eq!(missing.retry_delay_secs(), None);
    }

    #[test]
    fn missing_parameter_names_the_key() {
        let err = SkyliftError::Params(ParamsError::missing("subscription_id"));
        assert!(err.to_string().contains("subscription_id"));
    }
}
