//! The deployment pipeline.
//!
//! A single linear flow per invocation: provision resources into the
//! output bag, propagate access grants, link networks when private
//! connectivity is requested, roll the application out, wait for it to
//! become reachable, and register it behind the gateway. Control flows
//! strictly downward; the only looping lives in [`readiness`].

pub mod deployer;
pub mod gateway;
pub mod linker;
pub mod provisioner;
pub mod rbac;
pub mod readiness;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use deployer::{AppDeployer, HelmReleaser, RELEASE_NAME, ReleaseSpec, ReleaseValues, Releaser};
pub use gateway::{API_NAME, GatewayRegistrar};
pub use linker::NetworkLinker;
pub use provisioner::ResourceProvisioner;
pub use rbac::{RbacPropagator, RolePolicy, assignment_guid};
pub use readiness::{Poller, ReadinessWaiter, SpecProbe};
pub use runner::{Pipeline, PipelineOptions, PipelineReport, StageOutcome};
