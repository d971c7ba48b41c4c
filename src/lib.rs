// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![warn(missing_docs)]                // Public items should be documented

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::redundant_clone)]     // Useless clones warning

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Skylift
//!
//! An idempotent deployment orchestrator for the Skylift
//! retrieval-augmented chat stack.
//!
//! ## Overview
//!
//! Skylift provisions a multi-service cloud topology and rolls the
//! containerized application out onto it in one linear pass:
//!
//! 1. **Parameters**: a flat key/value JSON document is validated and
//!    resolved into an immutable context
//! 2. **Provision**: an ordered batch of idempotent ensure calls builds
//!    the topology (networks, identity, data stores, inference, cluster,
//!    gateway, monitoring), collecting outputs into the output bag
//! 3. **Grants**: the cluster's runtime identity is bound to each data
//!    resource with deterministic assignment identifiers
//! 4. **Links**: in private mode, the gateway and cluster networks are
//!    peered and private resolution zones bound to both
//! 5. **Deploy**: the application release is installed or upgraded with
//!    every endpoint wired in from the output bag
//! 6. **Readiness**: bounded polling for the ingress address and the
//!    interface-description endpoint
//! 7. **Register**: the application's interface description is imported
//!    behind the gateway
//!
//! A failure in any stage aborts the run; re-invocation converges
//! already-provisioned resources instead of duplicating them.
//!
//! ## Modules
//!
//! - [`params`]: parameter loading, validation, and defaults
//! - [`outputs`]: the append-only cross-stage output bag
//! - [`cloud`]: control-plane client and ensure-call boundary
//! - [`pipeline`]: the orchestration stages and driver
//! - [`cli`]: command-line interface
//!
//! ## Example
//!
//! ```json
//! {
//!   "location": "westeurope",
//!   "resource_group": "skylift-prod",
//!   "subscription_id": "00000000-0000-0000-0000-000000000001",
//!   "tenant_id": "00000000-0000-0000-0000-000000000002",
//!   "client_id": "00000000-0000-0000-0000-000000000003",
//!   "client_secret": "...",
//!   "gateway_tier": "Developer",
//!   "image_tag": "1.4.2"
//! }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod cloud;
pub mod error;
pub mod outputs;
pub mod params;
pub mod pipeline;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, OutputFormat, OutputFormatter};
pub use cloud::{ArmClient, ArmConfig, ControlPlane};
pub use error::{Result, SkyliftError};
pub use outputs::{OutputBag, ResourceOutputs};
pub use params::{ParamContext, ParamLoader, ParamValue};
pub use pipeline::{
    AppDeployer, GatewayRegistrar, HelmReleaser, NetworkLinker, Pipeline, PipelineOptions,
    PipelineReport, Poller, RbacPropagator, ReadinessWaiter, Releaser, ResourceProvisioner,
    RolePolicy,
};
