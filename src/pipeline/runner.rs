//! The pipeline driver.
//!
//! One linear pass per invocation: provision, propagate grants, link
//! networks (private mode only), deploy, wait for readiness, register
//! with the gateway. Every stage returns a `Result`; the first failure
//! aborts the run with an attributable error. There is no rollback —
//! recovery is re-invocation, relying on every stage's idempotence.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cloud::plane::ControlPlane;
use crate::error::Result;
use crate::outputs::{OutputBag, keys};
use crate::params::{ParamContext, names};

use super::deployer::{AppDeployer, RELEASE_NAME, Releaser};
use super::gateway::GatewayRegistrar;
use super::linker::NetworkLinker;
use super::provisioner::ResourceProvisioner;
use super::rbac::RbacPropagator;
use super::readiness::ReadinessWaiter;

/// Mode switches taken from the CLI surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Enforce private connectivity (peering + private resolution).
    pub private_networking: bool,
    /// Grant the invoking operator direct data-plane access.
    pub dev_access: bool,
}

/// Timing record for one completed stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    /// Stage name.
    pub stage: String,
    /// Wall-clock duration in seconds.
    pub duration_secs: f64,
}

impl StageOutcome {
    fn finish(stage: &str, started: Instant) -> Self {
        let outcome = Self {
            stage: stage.to_string(),
            duration_secs: started.elapsed().as_secs_f64(),
        };
        info!("Stage '{stage}' finished in {:.1}s", outcome.duration_secs);
        outcome
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Correlation id for this run.
    pub run_id: Uuid,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-stage timings in execution order.
    pub stages: Vec<StageOutcome>,
    /// The final output bag.
    pub outputs: OutputBag,
    /// The resolved backend URL registered behind the gateway.
    pub backend_url: String,
}

/// The linear deployment pipeline.
#[derive(Debug)]
pub struct Pipeline<'a, C: ControlPlane, R: Releaser> {
    /// Control plane every ensure call goes to.
    plane: &'a C,
    /// Cluster package-manager seam.
    releaser: &'a R,
    /// Resolved parameter context.
    params: &'a ParamContext,
    /// Mode switches.
    options: PipelineOptions,
    /// External cancellation flag for the readiness pollers.
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, C: ControlPlane, R: Releaser> Pipeline<'a, C, R> {
    /// Creates a pipeline over the given collaborators.
    #[must_use]
    pub const fn new(
        plane: &'a C,
        releaser: &'a R,
        params: &'a ParamContext,
        options: PipelineOptions,
    ) -> Self {
        Self {
            plane,
            releaser,
            params,
            options,
            cancel: None,
        }
    }

    /// Attaches an external cancellation flag.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Runs the pipeline to completion.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; nothing after a failed stage is
    /// attempted.
    pub async fn run(&self) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Starting deployment run {run_id}");

        let mut stages = Vec::new();
        let mut bag = OutputBag::new();

        let started = Instant::now();
        ResourceProvisioner::new(self.plane, self.params)
            .with_private(self.options.private_networking)
            .provision(&mut bag)
            .await?;
        stages.push(StageOutcome::finish("provision", started));

        let started = Instant::now();
        let propagator = RbacPropagator::new(self.plane);
        propagator.propagate(&bag).await?;
        if self.options.dev_access {
            let operator = self.params.str_value(names::OPERATOR_OBJECT_ID)?;
            propagator.grant_operator(&bag, operator).await?;
        }
        stages.push(StageOutcome::finish("rbac", started));

        if self.options.private_networking {
            let started = Instant::now();
            NetworkLinker::new(self.plane).link(&bag).await?;
            stages.push(StageOutcome::finish("link", started));
        } else {
            debug!("Private connectivity not requested; skipping network links");
        }

        let started = Instant::now();
        let cluster_name = bag.get(keys::CLUSTER)?.name.clone();
        let kubeconfig = self.plane.cluster_credentials(&cluster_name).await?;
        self.releaser.prepare(&kubeconfig).await?;
        AppDeployer::new(self.releaser, self.params)
            .deploy(&bag)
            .await?;
        stages.push(StageOutcome::finish("deploy", started));

        let started = Instant::now();
        let namespace = self.params.str_value(names::NAMESPACE)?;
        let mut waiter = ReadinessWaiter::new(self.releaser)?;
        if let Some(cancel) = &self.cancel {
            waiter = waiter.with_cancel(cancel.clone());
        }
        let address = waiter.await_ingress(namespace, RELEASE_NAME).await?;
        let backend_url = format!("http://{address}");
        waiter.await_interface(&backend_url).await?;
        stages.push(StageOutcome::finish("readiness", started));

        let started = Instant::now();
        GatewayRegistrar::new(self.plane)?
            .register(&bag, &backend_url)
            .await?;
        stages.push(StageOutcome::finish("register", started));

        info!("Deployment run {run_id} complete");
        Ok(PipelineReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            stages,
            outputs: bag,
            backend_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReadinessError, SkyliftError};
    use crate::params::ParamLoader;
    use crate::pipeline::testing::{FakePlane, FakeReleaser, test_params};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn spec_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openapi.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"openapi": "3.0.0", "paths": {}})),
            )
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn full_pipeline_success() {
        let server = spec_server().await;
        let address = server.uri().trim_start_matches("http://").to_string();

        let plane = FakePlane::new();
        let releaser = FakeReleaser::ready_at(address);
        let params = test_params();

        let report = Pipeline::new(&plane, &releaser, &params, PipelineOptions::default())
            .run()
            .await
            .unwrap();

        // The bag carries a non-empty endpoint for every data surface.
        assert!(!report.outputs.endpoint(keys::DOCUMENT_DB).unwrap().is_empty());
        assert!(!report.outputs.endpoint(keys::SEARCH).unwrap().is_empty());
        assert!(!report.outputs.endpoint(keys::INFERENCE).unwrap().is_empty());

        // One release, one kubeconfig handover, one API import.
        assert_eq!(releaser.release_count(), 1);
        assert_eq!(releaser.kubeconfigs.lock().unwrap().len(), 1);
        assert_eq!(plane.imports.lock().unwrap().len(), 1);

        let stage_names: Vec<&str> = report.stages.iter().map(|s| s.stage.as_str()).collect();
        assert_eq!(
            stage_names,
            vec!["provision", "rbac", "deploy", "readiness", "register"]
        );
        assert_eq!(report.backend_url, server.uri());
    }

    #[tokio::test(start_paused = true)]
    async fn ingress_timeout_aborts_before_gateway_registration() {
        let plane = FakePlane::new();
        let releaser = FakeReleaser::never_ready();
        let params = test_params();

        let err = Pipeline::new(&plane, &releaser, &params, PipelineOptions::default())
            .run()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SkyliftError::Readiness(ReadinessError::Timeout { .. })
        ));
        // The deployment happened, but the gateway was never touched.
        assert_eq!(releaser.release_count(), 1);
        assert!(plane.imports.lock().unwrap().is_empty());
        assert!(
            !plane
                .call_log()
                .iter()
                .any(|c| c.starts_with("import_api"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn private_mode_links_networks_before_deploying() {
        let plane = FakePlane::new();
        let releaser = FakeReleaser::never_ready();
        let params = test_params();
        let options = PipelineOptions {
            private_networking: true,
            dev_access: false,
        };

        // The run still times out at readiness, but linking has already
        // happened by then.
        let _ = Pipeline::new(&plane, &releaser, &params, options).run().await;

        assert_eq!(plane.peerings.lock().unwrap().len(), 2);
        assert!(!plane.zone_links.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn public_mode_skips_network_links() {
        let plane = FakePlane::new();
        let releaser = FakeReleaser::never_ready();
        let params = test_params();

        let _ = Pipeline::new(&plane, &releaser, &params, PipelineOptions::default())
            .run()
            .await;

        assert!(plane.peerings.lock().unwrap().is_empty());
        assert!(plane.zone_links.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dev_access_grants_the_operator() {
        let doc = serde_json::json!({
            "location": "westeurope",
            "resource_group": "skylift-test",
            "subscription_id": "00000000-0000-0000-0000-000000000001",
            "tenant_id": "00000000-0000-0000-0000-000000000002",
            "client_id": "00000000-0000-0000-0000-000000000003",
            "client_secret": "s3cret",
            "operator_object_id": "op-7"
        });
        let params = ParamLoader::new().parse_json(&doc.to_string(), None).unwrap();

        let plane = FakePlane::new();
        let releaser = FakeReleaser::never_ready();
        let options = PipelineOptions {
            private_networking: false,
            dev_access: true,
        };

        let _ = Pipeline::new(&plane, &releaser, &params, options).run().await;

        let assignments = plane.assignments.lock().unwrap();
        assert!(assignments.iter().any(|a| a.principal_id == "op-7"));
        assert!(assignments.iter().any(|a| a.principal_id == "principal-kubelet"));
    }

    #[tokio::test]
    async fn a_rejected_document_misses_the_control_plane_entirely() {
        let doc = serde_json::json!({
            "location": "westeurope",
            "resource_group": "skylift-test",
            "tenant_id": "00000000-0000-0000-0000-000000000002",
            "client_id": "00000000-0000-0000-0000-000000000003",
            "client_secret": "s3cret"
        });

        let plane = FakePlane::new();
        let err = ParamLoader::new()
            .parse_json(&doc.to_string(), None)
            .unwrap_err();

        // Validation names the missing key and no ensure call was made.
        assert!(err.to_string().contains("subscription_id"));
        assert_eq!(plane.call_count(), 0);
    }
}
