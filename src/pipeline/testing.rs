//! Recording fakes shared by the pipeline unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::cloud::plane::ControlPlane;
use crate::cloud::types::{
    ApiDefinitionSpec, ClusterSpec, DocumentDbSpec, GatewaySpec, IdentitySpec, InferenceSpec,
    MonitoringSpec, NetworkSpec, PeeringSpec, RegistrySpec, RoleAssignmentSpec,
    RoleDefinitionSpec, SearchSpec, StorageSpec, ZoneLinkSpec,
};
use crate::error::{CloudError, Result, SkyliftError};
use crate::outputs::ResourceOutputs;
use crate::params::{ParamContext, ParamLoader};

use super::deployer::{ReleaseSpec, Releaser};

/// Builds a fully resolved parameter context for tests.
pub fn test_params() -> ParamContext {
    let doc = serde_json::json!({
        "location": "westeurope",
        "resource_group": "skylift-test",
        "subscription_id": "00000000-0000-0000-0000-000000000001",
        "tenant_id": "00000000-0000-0000-0000-000000000002",
        "client_id": "00000000-0000-0000-0000-000000000003",
        "client_secret": "s3cret"
    });
    ParamLoader::new()
        .parse_json(&doc.to_string(), None)
        .expect("test parameter document must resolve")
}

/// A recording control plane. Every call appends `method:name` to the
/// call log and returns deterministic outputs derived from the spec, so
/// repeated runs produce identical output bags.
#[derive(Debug, Default)]
pub struct FakePlane {
    /// Ordered call log.
    pub calls: Mutex<Vec<String>>,
    /// Method name that should fail with an injected error.
    pub fail_on: Option<&'static str>,
    /// Every role assignment submitted.
    pub assignments: Mutex<Vec<RoleAssignmentSpec>>,
    /// Every peering submitted.
    pub peerings: Mutex<Vec<PeeringSpec>>,
    /// Every zone link submitted.
    pub zone_links: Mutex<Vec<ZoneLinkSpec>>,
    /// Every API definition imported.
    pub imports: Mutex<Vec<ApiDefinitionSpec>>,
}

impl FakePlane {
    /// Creates a recording plane that never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recording plane where the named method fails.
    pub fn failing_on(method: &'static str) -> Self {
        Self {
            fail_on: Some(method),
            ..Self::default()
        }
    }

    /// Number of calls recorded so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Snapshot of the ordered call log.
    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn track(&self, method: &'static str, name: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("{method}:{name}"));
        if self.fail_on == Some(method) {
            return Err(SkyliftError::Cloud(CloudError::request(
                500,
                format!("injected failure in {method}"),
            )));
        }
        Ok(())
    }

    fn outputs(name: &str) -> ResourceOutputs {
        ResourceOutputs::new(name, format!("/fake/{name}"))
            .with_endpoint(format!("https://{name}.example.net"))
    }
}

#[async_trait]
impl ControlPlane for FakePlane {
    async fn ensure_network(&self, spec: &NetworkSpec) -> Result<ResourceOutputs> {
        self.track("ensure_network", &spec.name)?;
        Ok(ResourceOutputs::new(&spec.name, format!("/fake/{}", spec.name)))
    }

    async fn ensure_identity(&self, spec: &IdentitySpec) -> Result<ResourceOutputs> {
        self.track("ensure_identity", &spec.name)?;
        Ok(ResourceOutputs::new(&spec.name, format!("/fake/{}", spec.name))
            .with_principal("principal-identity")
            .with_extra("client_id", "client-123"))
    }

    async fn ensure_document_db(&self, spec: &DocumentDbSpec) -> Result<ResourceOutputs> {
        self.track("ensure_document_db", &spec.name)?;
        Ok(Self::outputs(&spec.name))
    }

    async fn ensure_search(&self, spec: &SearchSpec) -> Result<ResourceOutputs> {
        self.track("ensure_search", &spec.name)?;
        Ok(Self::outputs(&spec.name))
    }

    async fn ensure_storage(&self, spec: &StorageSpec) -> Result<ResourceOutputs> {
        self.track("ensure_storage", &spec.name)?;
        Ok(Self::outputs(&spec.name))
    }

    async fn ensure_inference(&self, spec: &InferenceSpec) -> Result<ResourceOutputs> {
        self.track("ensure_inference", &spec.name)?;
        Ok(Self::outputs(&spec.name))
    }

    async fn ensure_registry(&self, spec: &RegistrySpec) -> Result<ResourceOutputs> {
        self.track("ensure_registry", &spec.name)?;
        Ok(Self::outputs(&spec.name))
    }

    async fn ensure_cluster(&self, spec: &ClusterSpec) -> Result<ResourceOutputs> {
        self.track("ensure_cluster", &spec.name)?;
        Ok(ResourceOutputs::new(&spec.name, format!("/fake/{}", spec.name))
            .with_principal("principal-kubelet"))
    }

    async fn ensure_gateway(&self, spec: &GatewaySpec) -> Result<ResourceOutputs> {
        self.track("ensure_gateway", &spec.name)?;
        Ok(Self::outputs(&spec.name))
    }

    async fn ensure_monitoring(&self, spec: &MonitoringSpec) -> Result<ResourceOutputs> {
        self.track("ensure_monitoring", &spec.name)?;
        Ok(ResourceOutputs::new(&spec.name, format!("/fake/{}", spec.name)))
    }

    async fn ensure_role_definition(&self, spec: &RoleDefinitionSpec) -> Result<ResourceOutputs> {
        self.track("ensure_role_definition", &spec.name)?;
        Ok(ResourceOutputs::new(
            &spec.name,
            format!("{}/sqlRoleDefinitions/{}", spec.scope, spec.definition_id),
        ))
    }

    async fn ensure_role_assignment(&self, spec: &RoleAssignmentSpec) -> Result<()> {
        self.track("ensure_role_assignment", &spec.assignment_id)?;
        self.assignments.lock().unwrap().push(spec.clone());
        Ok(())
    }

    async fn ensure_peering(&self, spec: &PeeringSpec) -> Result<()> {
        self.track("ensure_peering", &spec.name)?;
        self.peerings.lock().unwrap().push(spec.clone());
        Ok(())
    }

    async fn ensure_private_zone(&self, zone: &str) -> Result<ResourceOutputs> {
        self.track("ensure_private_zone", zone)?;
        Ok(ResourceOutputs::new(zone, format!("/fake/zones/{zone}")))
    }

    async fn ensure_zone_link(&self, spec: &ZoneLinkSpec) -> Result<()> {
        self.track("ensure_zone_link", &spec.link_name)?;
        self.zone_links.lock().unwrap().push(spec.clone());
        Ok(())
    }

    async fn import_api(&self, spec: &ApiDefinitionSpec) -> Result<()> {
        self.track("import_api", &spec.api_name)?;
        self.imports.lock().unwrap().push(spec.clone());
        Ok(())
    }

    async fn cluster_credentials(&self, cluster_name: &str) -> Result<String> {
        self.track("cluster_credentials", cluster_name)?;
        Ok(String::from("apiVersion: v1\nkind: Config\n"))
    }
}

/// A recording releaser with a programmable ingress schedule.
#[derive(Debug)]
pub struct FakeReleaser {
    /// Every release spec applied.
    pub releases: Mutex<Vec<ReleaseSpec>>,
    /// Kubeconfigs handed over via `prepare`.
    pub kubeconfigs: Mutex<Vec<String>>,
    /// Number of ingress probes observed so far.
    pub ingress_probes: AtomicU32,
    /// Ingress address appears after this many probes; `None` means the
    /// address never appears.
    pub ingress_after: Option<u32>,
    /// The address reported once the ingress appears.
    pub address: String,
}

impl FakeReleaser {
    /// Ingress address appears immediately, reporting `address`.
    pub fn ready_at(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::with_ingress_after(Some(0))
        }
    }

    /// Ingress address never appears.
    pub fn never_ready() -> Self {
        Self::with_ingress_after(None)
    }

    /// Ingress address appears after `n` empty probes.
    pub fn with_ingress_after(ingress_after: Option<u32>) -> Self {
        Self {
            releases: Mutex::new(Vec::new()),
            kubeconfigs: Mutex::new(Vec::new()),
            ingress_probes: AtomicU32::new(0),
            ingress_after,
            address: String::from("203.0.113.10"),
        }
    }

    /// Number of releases applied.
    pub fn release_count(&self) -> usize {
        self.releases.lock().unwrap().len()
    }
}

#[async_trait]
impl Releaser for FakeReleaser {
    async fn prepare(&self, kubeconfig: &str) -> Result<()> {
        self.kubeconfigs.lock().unwrap().push(kubeconfig.to_string());
        Ok(())
    }

    async fn install_or_upgrade(&self, spec: &ReleaseSpec) -> Result<()> {
        self.releases.lock().unwrap().push(spec.clone());
        Ok(())
    }

    async fn ingress_address(&self, _namespace: &str, _service: &str) -> Result<Option<String>> {
        let seen = self.ingress_probes.fetch_add(1, Ordering::SeqCst);
        match self.ingress_after {
            Some(after) if seen >= after => Ok(Some(self.address.clone())),
            _ => Ok(None),
        }
    }
}
