//! Request specs for the control-plane ensure calls.
//!
//! Each spec carries exactly the inputs its resource kind needs; the
//! resource group, subscription, and location plumbing lives in the
//! client. Specs are built once per run and never mutated.

/// A subnet inside a virtual network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetSpec {
    /// Subnet name.
    pub name: String,
    /// Address prefix in CIDR notation.
    pub prefix: String,
}

/// Virtual network ensure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    /// Network name.
    pub name: String,
    /// Address space in CIDR notation.
    pub address_space: String,
    /// Subnets carved out of the address space.
    pub subnets: Vec<SubnetSpec>,
}

/// User-assigned runtime identity ensure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentitySpec {
    /// Identity name.
    pub name: String,
}

/// Document database account ensure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentDbSpec {
    /// Account name.
    pub name: String,
    /// Consistency level requested for the account.
    pub consistency: String,
}

/// Search service ensure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpec {
    /// Service name.
    pub name: String,
    /// Pricing tier.
    pub sku: String,
}

/// Object storage account ensure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSpec {
    /// Account name.
    pub name: String,
    /// Endpoint suffix for the blob endpoint.
    pub endpoint_suffix: String,
}

/// A model deployment on the inference account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDeployment {
    /// Deployment name the application addresses.
    pub name: String,
    /// Upstream model identifier.
    pub model: String,
    /// Provisioned throughput units.
    pub capacity: i64,
}

/// LLM inference account ensure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceSpec {
    /// Account name.
    pub name: String,
    /// Model deployments to converge on the account.
    pub deployments: Vec<ModelDeployment>,
}

/// Container registry ensure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySpec {
    /// Registry name (alphanumeric only).
    pub name: String,
}

/// Managed container cluster ensure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    /// Cluster name.
    pub name: String,
    /// Worker node count.
    pub node_count: i64,
    /// Worker node size.
    pub node_size: String,
    /// Subnet the cluster nodes join.
    pub subnet_id: String,
    /// User-assigned identity bound to the cluster runtime.
    pub identity_id: String,
}

/// API gateway ensure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySpec {
    /// Gateway name.
    pub name: String,
    /// Pricing tier.
    pub tier: String,
    /// Scale-unit count.
    pub capacity: i64,
    /// Publisher contact required by the gateway service.
    pub publisher_email: String,
    /// Publisher display name.
    pub publisher_name: String,
    /// Subnet the gateway joins, when private connectivity is requested.
    pub subnet_id: Option<String>,
}

/// Monitoring workspace ensure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringSpec {
    /// Workspace name.
    pub name: String,
    /// Log retention in days.
    pub retention_days: i64,
}

/// Kind of principal a role is granted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalKind {
    /// A workload identity.
    ServicePrincipal,
    /// A human operator.
    User,
}

impl PrincipalKind {
    /// Wire form of the principal kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServicePrincipal => "ServicePrincipal",
            Self::User => "User",
        }
    }
}

/// Custom role definition ensure request (document db data plane).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinitionSpec {
    /// Deterministic definition identifier.
    pub definition_id: String,
    /// Human-readable role name.
    pub name: String,
    /// Account scope the definition is assignable at.
    pub scope: String,
    /// Explicitly enumerated data actions. The permission surface is
    /// spelled out rather than inherited from a built-in role.
    pub permissions: Vec<String>,
}

/// Role assignment ensure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignmentSpec {
    /// Deterministic assignment identifier derived from
    /// (scope, principal, kind, role).
    pub assignment_id: String,
    /// Resource scope the grant applies to.
    pub scope: String,
    /// Principal receiving the grant.
    pub principal_id: String,
    /// Kind of the principal.
    pub principal_kind: PrincipalKind,
    /// Role definition identifier (built-in GUID or custom definition id).
    pub role_definition_id: String,
    /// True when the assignment targets the document db data plane,
    /// which uses its own assignment endpoint.
    pub data_plane: bool,
}

/// Virtual network peering ensure request. One direction only; callers
/// issue both directions because peering is not symmetric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeeringSpec {
    /// Deterministic peering name.
    pub name: String,
    /// Network the peering is created on.
    pub source_network: String,
    /// Fully qualified id of the remote network.
    pub target_network_id: String,
}

/// Private resolution zone to network link ensure request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneLinkSpec {
    /// Zone name.
    pub zone: String,
    /// Deterministic link name derived from zone and network id.
    pub link_name: String,
    /// Fully qualified id of the network being linked.
    pub network_id: String,
}

/// API definition import request for the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiDefinitionSpec {
    /// Gateway service name.
    pub gateway_name: String,
    /// API definition name; re-import under the same name replaces.
    pub api_name: String,
    /// Display name shown on the gateway.
    pub display_name: String,
    /// URL path the API is mounted under.
    pub path: String,
    /// Resolved backend service URL.
    pub backend_url: String,
    /// Machine-readable interface description fetched from the backend.
    pub spec_document: serde_json::Value,
}
