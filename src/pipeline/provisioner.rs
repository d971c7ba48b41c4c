//! Resource provisioner: the ordered batch of idempotent ensure calls.
//!
//! Ordering is a static, hand-verified topological sort: a resource that
//! consumes another resource's output is always ordered after it. There
//! is no dependency solver; the rule for any change here is "never invoke
//! a call whose inputs include an output key not yet in the bag".

use tracing::info;

use crate::cloud::plane::ControlPlane;
use crate::cloud::types::{
    ClusterSpec, DocumentDbSpec, GatewaySpec, IdentitySpec, InferenceSpec, ModelDeployment,
    MonitoringSpec, NetworkSpec, RegistrySpec, SearchSpec, StorageSpec, SubnetSpec,
};
use crate::error::Result;
use crate::outputs::{Expect, OutputBag, keys};
use crate::params::{ParamContext, names};

/// Worker node count for the container cluster.
const CLUSTER_NODE_COUNT: i64 = 3;

/// Worker node size for the container cluster.
const CLUSTER_NODE_SIZE: &str = "Standard_D4s_v5";

/// Monitoring workspace retention in days.
const MONITORING_RETENTION_DAYS: i64 = 30;

/// Storage account names are capped by the platform.
const STORAGE_NAME_MAX: usize = 24;

/// Publisher contact required by the gateway service.
const GATEWAY_PUBLISHER_EMAIL: &str = "platform@skylift.dev";
const GATEWAY_PUBLISHER_NAME: &str = "Skylift Platform";

/// Chat model deployed on the inference account.
const CHAT_MODEL: &str = "gpt-4o";

/// Embedding model deployed on the inference account.
const EMBEDDING_MODEL: &str = "text-embedding-3-large";

/// Issues the ordered ensure calls and collects their outputs.
#[derive(Debug)]
pub struct ResourceProvisioner<'a, C: ControlPlane> {
    /// Control plane the ensure calls go to.
    plane: &'a C,
    /// Resolved parameter context.
    params: &'a ParamContext,
    /// Whether the gateway joins its network (private connectivity).
    private: bool,
}

impl<'a, C: ControlPlane> ResourceProvisioner<'a, C> {
    /// Creates a new provisioner.
    #[must_use]
    pub const fn new(plane: &'a C, params: &'a ParamContext) -> Self {
        Self {
            plane,
            params,
            private: false,
        }
    }

    /// Enables private connectivity for the gateway network profile.
    #[must_use]
    pub const fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    /// Runs the full ensure batch, filling the output bag.
    ///
    /// Failure of any single call aborts the remainder; on re-run,
    /// already-converged resources are confirmed rather than re-created.
    ///
    /// # Errors
    ///
    /// Returns the first ensure-call failure, or a named error when a
    /// call omits an expected output.
    pub async fn provision(&self, bag: &mut OutputBag) -> Result<()> {
        info!("Provisioning resources into group '{}'", self.group()?);

        self.ensure_networks(bag).await?;
        self.ensure_identity(bag).await?;
        self.ensure_document_db(bag).await?;
        self.ensure_search(bag).await?;
        self.ensure_storage(bag).await?;
        self.ensure_inference(bag).await?;
        self.ensure_registry(bag).await?;
        self.ensure_cluster(bag).await?;
        self.ensure_gateway(bag).await?;
        self.ensure_monitoring(bag).await?;

        info!("Provisioned {} resources", bag.len());
        Ok(())
    }

    fn group(&self) -> Result<&str> {
        self.params.str_value(names::RESOURCE_GROUP)
    }

    async fn ensure_networks(&self, bag: &mut OutputBag) -> Result<()> {
        let group = self.group()?;

        let cluster_net = NetworkSpec {
            name: format!("{group}-vnet"),
            address_space: String::from("10.10.0.0/16"),
            subnets: vec![
                SubnetSpec {
                    name: String::from("cluster"),
                    prefix: String::from("10.10.0.0/20"),
                },
                SubnetSpec {
                    name: String::from("private-endpoints"),
                    prefix: String::from("10.10.16.0/24"),
                },
            ],
        };
        let outputs = self.plane.ensure_network(&cluster_net).await?;
        bag.record(keys::VNET, outputs, &[])?;

        let gateway_net = NetworkSpec {
            name: format!("{group}-gw-vnet"),
            address_space: String::from("10.20.0.0/16"),
            subnets: vec![SubnetSpec {
                name: String::from("gateway"),
                prefix: String::from("10.20.0.0/24"),
            }],
        };
        let outputs = self.plane.ensure_network(&gateway_net).await?;
        bag.record(keys::GATEWAY_VNET, outputs, &[])?;

        Ok(())
    }

    async fn ensure_identity(&self, bag: &mut OutputBag) -> Result<()> {
        let spec = IdentitySpec {
            name: format!("{}-app-identity", self.group()?),
        };
        let outputs = self.plane.ensure_identity(&spec).await?;
        bag.record(
            keys::IDENTITY,
            outputs,
            &[Expect::Principal, Expect::Extra("client_id")],
        )
    }

    async fn ensure_document_db(&self, bag: &mut OutputBag) -> Result<()> {
        let spec = DocumentDbSpec {
            name: format!("{}docs", flat_name(self.group()?)),
            consistency: String::from("Session"),
        };
        let outputs = self.plane.ensure_document_db(&spec).await?;
        bag.record(keys::DOCUMENT_DB, outputs, &[Expect::Endpoint])
    }

    async fn ensure_search(&self, bag: &mut OutputBag) -> Result<()> {
        let spec = SearchSpec {
            name: format!("{}search", flat_name(self.group()?)),
            sku: String::from("standard"),
        };
        let outputs = self.plane.ensure_search(&spec).await?;
        bag.record(keys::SEARCH, outputs, &[Expect::Endpoint])
    }

    async fn ensure_storage(&self, bag: &mut OutputBag) -> Result<()> {
        let mut name = format!("{}store", flat_name(self.group()?));
        name.truncate(STORAGE_NAME_MAX);

        let spec = StorageSpec {
            name,
            endpoint_suffix: self.params.str_value(names::ENDPOINT_SUFFIX)?.to_string(),
        };
        let outputs = self.plane.ensure_storage(&spec).await?;
        bag.record(keys::STORAGE, outputs, &[Expect::Endpoint])
    }

    async fn ensure_inference(&self, bag: &mut OutputBag) -> Result<()> {
        let spec = InferenceSpec {
            name: format!("{}llm", flat_name(self.group()?)),
            deployments: vec![
                ModelDeployment {
                    name: String::from("chat"),
                    model: String::from(CHAT_MODEL),
                    capacity: 10,
                },
                ModelDeployment {
                    name: String::from("embeddings"),
                    model: String::from(EMBEDDING_MODEL),
                    capacity: 30,
                },
            ],
        };
        let outputs = self.plane.ensure_inference(&spec).await?;
        bag.record(keys::INFERENCE, outputs, &[Expect::Endpoint])
    }

    async fn ensure_registry(&self, bag: &mut OutputBag) -> Result<()> {
        let spec = RegistrySpec {
            name: self.params.str_value(names::REGISTRY_NAME)?.to_string(),
        };
        let outputs = self.plane.ensure_registry(&spec).await?;
        bag.record(keys::REGISTRY, outputs, &[Expect::Endpoint])
    }

    async fn ensure_cluster(&self, bag: &mut OutputBag) -> Result<()> {
        // Consumes the network and identity outputs; ordered after both.
        let subnet_id = format!("{}/subnets/cluster", bag.id(keys::VNET)?);
        let identity_id = bag.id(keys::IDENTITY)?.to_string();

        let spec = ClusterSpec {
            name: format!("{}-cluster", self.group()?),
            node_count: CLUSTER_NODE_COUNT,
            node_size: String::from(CLUSTER_NODE_SIZE),
            subnet_id,
            identity_id,
        };
        let outputs = self.plane.ensure_cluster(&spec).await?;
        bag.record(keys::CLUSTER, outputs, &[Expect::Principal])
    }

    async fn ensure_gateway(&self, bag: &mut OutputBag) -> Result<()> {
        let subnet_id = if self.private {
            Some(format!("{}/subnets/gateway", bag.id(keys::GATEWAY_VNET)?))
        } else {
            None
        };

        let spec = GatewaySpec {
            name: format!("{}-gateway", self.group()?),
            tier: self.params.str_value(names::GATEWAY_TIER)?.to_string(),
            capacity: self.params.int_value(names::GATEWAY_CAPACITY)?,
            publisher_email: String::from(GATEWAY_PUBLISHER_EMAIL),
            publisher_name: String::from(GATEWAY_PUBLISHER_NAME),
            subnet_id,
        };
        let outputs = self.plane.ensure_gateway(&spec).await?;
        bag.record(keys::GATEWAY, outputs, &[Expect::Endpoint])
    }

    async fn ensure_monitoring(&self, bag: &mut OutputBag) -> Result<()> {
        let spec = MonitoringSpec {
            name: format!("{}-logs", self.group()?),
            retention_days: MONITORING_RETENTION_DAYS,
        };
        let outputs = self.plane.ensure_monitoring(&spec).await?;
        bag.record(keys::MONITORING, outputs, &[])
    }
}

/// Flattens a resource-group name into the lowercase alphanumeric form
/// accepted by account-style resource names.
fn flat_name(group: &str) -> String {
    group
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}
