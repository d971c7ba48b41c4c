//! Cloud control-plane access.
//!
//! [`client`] owns the HTTP transport (token acquisition, bounded retry),
//! [`types`] the request specs for each resource kind, and [`plane`] the
//! [`plane::ControlPlane`] trait of thin, idempotent "ensure resource"
//! wrappers the pipeline is written against.

pub mod client;
pub mod plane;
pub mod types;

pub use client::{ArmClient, ArmConfig};
pub use plane::ControlPlane;
pub use types::{
    ApiDefinitionSpec, ClusterSpec, DocumentDbSpec, GatewaySpec, IdentitySpec, InferenceSpec,
    ModelDeployment, MonitoringSpec, NetworkSpec, PeeringSpec, PrincipalKind, RegistrySpec,
    RoleAssignmentSpec, RoleDefinitionSpec, SearchSpec, StorageSpec, SubnetSpec, ZoneLinkSpec,
};
