//! Parameter document handling.
//!
//! The orchestrator is driven by a flat key/value JSON document. This
//! module loads that document, validates the required set, fills defaults
//! for the optional set, and exposes the result as an immutable context.

mod context;
mod loader;

pub use context::{ParamContext, ParamValue};
pub use loader::{DefaultRule, OPTIONAL_PARAMS, OptionalParam, ParamLoader, REQUIRED_PARAMS};

/// Well-known parameter names.
pub mod names {
    /// Cloud region for every provisioned resource.
    pub const LOCATION: &str = "location";
    /// Resource group the topology lives in.
    pub const RESOURCE_GROUP: &str = "resource_group";
    /// Subscription identifier.
    pub const SUBSCRIPTION_ID: &str = "subscription_id";
    /// Identity-provider tenant.
    pub const TENANT_ID: &str = "tenant_id";
    /// Identity-provider client (application) id.
    pub const CLIENT_ID: &str = "client_id";
    /// Identity-provider client secret.
    pub const CLIENT_SECRET: &str = "client_secret";
    /// Cloud flavor used to derive endpoint suffixes.
    pub const CLOUD: &str = "cloud";
    /// API gateway pricing tier.
    pub const GATEWAY_TIER: &str = "gateway_tier";
    /// API gateway scale-unit count.
    pub const GATEWAY_CAPACITY: &str = "gateway_capacity";
    /// Container registry name.
    pub const REGISTRY_NAME: &str = "registry_name";
    /// Storage endpoint suffix.
    pub const ENDPOINT_SUFFIX: &str = "endpoint_suffix";
    /// Comma-separated telemetry sinks handed to the application.
    pub const TELEMETRY_SINKS: &str = "telemetry_sinks";
    /// Application image name.
    pub const IMAGE_NAME: &str = "image_name";
    /// Application image tag.
    pub const IMAGE_TAG: &str = "image_tag";
    /// Cluster namespace the release is installed into.
    pub const NAMESPACE: &str = "namespace";
    /// Path to the application chart.
    pub const CHART_PATH: &str = "chart_path";
    /// Object id of the invoking operator (developer mode).
    pub const OPERATOR_OBJECT_ID: &str = "operator_object_id";
    /// Application debug switch.
    pub const DEBUG: &str = "debug";
}
