//! Application deployment onto the cluster.
//!
//! Renders the release values (image coordinates, endpoint and identity
//! wiring from the output bag, feature flags from the parameters) and
//! applies them with install-or-upgrade semantics under one fixed
//! release name. Re-running with changed values converges the running
//! application without a teardown.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use crate::error::{ReleaseError, Result, SkyliftError};
use crate::outputs::{OutputBag, keys};
use crate::params::{ParamContext, names};

/// The fixed release name; the install-or-upgrade key.
pub const RELEASE_NAME: &str = "skylift-rag";

/// A rendered release ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSpec {
    /// Release name.
    pub release: String,
    /// Chart path.
    pub chart: String,
    /// Target namespace.
    pub namespace: String,
    /// Rendered values document.
    pub values_yaml: String,
}

/// Image coordinates for the release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageValues {
    /// Repository, including the registry endpoint.
    pub repository: String,
    /// Image tag.
    pub tag: String,
}

/// The typed values document handed to the package manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseValues {
    /// Image coordinates.
    pub image: ImageValues,
    /// Environment-equivalent runtime settings.
    pub settings: BTreeMap<String, String>,
    /// Telemetry sinks enabled in the application.
    pub telemetry_sinks: Vec<String>,
    /// Application debug switch.
    pub debug: bool,
}

/// The cluster package-manager seam.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Releaser: Send + Sync {
    /// Hands over cluster credentials before the first release call.
    async fn prepare(&self, kubeconfig: &str) -> Result<()>;

    /// Installs the release if absent, upgrades it in place otherwise.
    async fn install_or_upgrade(&self, spec: &ReleaseSpec) -> Result<()>;

    /// Observes the externally routable address of the named service,
    /// if one has been assigned yet.
    async fn ingress_address(&self, namespace: &str, service: &str) -> Result<Option<String>>;
}

/// Production releaser shelling out to `helm` and `kubectl`.
#[derive(Debug)]
pub struct HelmReleaser {
    /// Path the kubeconfig is written to and read from.
    kubeconfig_path: PathBuf,
}

impl Default for HelmReleaser {
    fn default() -> Self {
        Self::new()
    }
}

impl HelmReleaser {
    /// Creates a releaser with a kubeconfig under the system temp dir.
    #[must_use]
    pub fn new() -> Self {
        Self {
            kubeconfig_path: std::env::temp_dir().join("skylift-kubeconfig.yaml"),
        }
    }

    /// Overrides the kubeconfig path.
    #[must_use]
    pub fn with_kubeconfig_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.kubeconfig_path = path.into();
        self
    }

    /// Runs an external tool, capturing output.
    async fn run_tool(&self, tool: &'static str, args: &[&str]) -> Result<String> {
        debug!("Running {tool} {}", args.join(" "));

        let output = tokio::process::Command::new(tool)
            .args(args)
            .env("KUBECONFIG", &self.kubeconfig_path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                SkyliftError::Release(ReleaseError::ToolUnavailable {
                    tool,
                    message: e.to_string(),
                })
            })?;

        if !output.status.success() {
            return Err(SkyliftError::Release(ReleaseError::ToolFailed {
                tool,
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl Releaser for HelmReleaser {
    async fn prepare(&self, kubeconfig: &str) -> Result<()> {
        tokio::fs::write(&self.kubeconfig_path, kubeconfig)
            .await
            .map_err(|e| {
                SkyliftError::Release(ReleaseError::Credentials {
                    message: e.to_string(),
                })
            })?;

        debug!(
            "Cluster credentials written to {}",
            self.kubeconfig_path.display()
        );
        Ok(())
    }

    async fn install_or_upgrade(&self, spec: &ReleaseSpec) -> Result<()> {
        let values_path =
            std::env::temp_dir().join(format!("skylift-values-{}.yaml", uuid::Uuid::new_v4()));
        tokio::fs::write(&values_path, &spec.values_yaml).await?;

        let values_arg = values_path.display().to_string();
        let result = self
            .run_tool(
                "helm",
                &[
                    "upgrade",
                    "--install",
                    &spec.release,
                    &spec.chart,
                    "--namespace",
                    &spec.namespace,
                    "--create-namespace",
                    "--values",
                    &values_arg,
                    "--wait",
                ],
            )
            .await;

        let _ = tokio::fs::remove_file(&values_path).await;
        result.map(|_| ())
    }

    async fn ingress_address(&self, namespace: &str, service: &str) -> Result<Option<String>> {
        let result = self
            .run_tool(
                "kubectl",
                &[
                    "get",
                    "svc",
                    "--namespace",
                    namespace,
                    service,
                    "-o",
                    "jsonpath={.status.loadBalancer.ingress[0].ip}",
                ],
            )
            .await;

        match result {
            Ok(stdout) => {
                let address = stdout.trim();
                if address.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(address.to_string()))
                }
            }
            // The service may simply not exist yet during early polling.
            Err(SkyliftError::Release(ReleaseError::ToolFailed { .. })) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Renders and applies the application release.
#[derive(Debug)]
pub struct AppDeployer<'a, R: Releaser> {
    /// Package-manager seam.
    releaser: &'a R,
    /// Resolved parameter context.
    params: &'a ParamContext,
}

impl<'a, R: Releaser> AppDeployer<'a, R> {
    /// Creates a new deployer.
    #[must_use]
    pub const fn new(releaser: &'a R, params: &'a ParamContext) -> Self {
        Self { releaser, params }
    }

    /// Builds the typed values document from the output bag and the
    /// parameter context. Every endpoint the application needs at
    /// runtime flows through here.
    ///
    /// # Errors
    ///
    /// Returns a named error if a required output is absent from the bag.
    pub fn build_values(&self, bag: &OutputBag) -> Result<ReleaseValues> {
        let registry = bag.endpoint(keys::REGISTRY)?;
        let image_name = self.params.str_value(names::IMAGE_NAME)?;

        let mut settings = BTreeMap::new();
        settings.insert(
            String::from("DOCUMENT_DB_ENDPOINT"),
            bag.endpoint(keys::DOCUMENT_DB)?.to_string(),
        );
        settings.insert(
            String::from("SEARCH_ENDPOINT"),
            bag.endpoint(keys::SEARCH)?.to_string(),
        );
        settings.insert(
            String::from("STORAGE_BLOB_ENDPOINT"),
            bag.endpoint(keys::STORAGE)?.to_string(),
        );
        settings.insert(
            String::from("INFERENCE_ENDPOINT"),
            bag.endpoint(keys::INFERENCE)?.to_string(),
        );
        settings.insert(
            String::from("GATEWAY_ENDPOINT"),
            bag.endpoint(keys::GATEWAY)?.to_string(),
        );
        settings.insert(
            String::from("IDENTITY_CLIENT_ID"),
            bag.extra(keys::IDENTITY, "client_id")?.to_string(),
        );
        settings.insert(
            String::from("MONITORING_WORKSPACE_ID"),
            bag.id(keys::MONITORING)?.to_string(),
        );
        settings.insert(
            String::from("TENANT_ID"),
            self.params.str_value(names::TENANT_ID)?.to_string(),
        );

        let telemetry_sinks = self
            .params
            .str_value(names::TELEMETRY_SINKS)?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(ReleaseValues {
            image: ImageValues {
                repository: format!("{registry}/{image_name}"),
                tag: self.params.str_value(names::IMAGE_TAG)?.to_string(),
            },
            settings,
            telemetry_sinks,
            debug: self.params.bool_value(names::DEBUG)?,
        })
    }

    /// Renders the values and applies the release.
    ///
    /// # Errors
    ///
    /// Returns an error if value construction, rendering, or the release
    /// call fails.
    pub async fn deploy(&self, bag: &OutputBag) -> Result<()> {
        let values = self.build_values(bag)?;
        let values_yaml = serde_yaml::to_string(&values).map_err(|e| {
            SkyliftError::Release(ReleaseError::ValuesRender {
                message: e.to_string(),
            })
        })?;

        let spec = ReleaseSpec {
            release: String::from(RELEASE_NAME),
            chart: self.params.str_value(names::CHART_PATH)?.to_string(),
            namespace: self.params.str_value(names::NAMESPACE)?.to_string(),
            values_yaml,
        };

        info!(
            "Applying release '{}' to namespace '{}'",
            spec.release, spec.namespace
        );
        self.releaser.install_or_upgrade(&spec).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::provisioner::ResourceProvisioner;
    use crate::pipeline::testing::{FakePlane, test_params};

    async fn sample_bag() -> OutputBag {
        let plane = FakePlane::new();
        let params = test_params();
        let mut bag = OutputBag::new();
        ResourceProvisioner::new(&plane, &params)
            .provision(&mut bag)
            .await
            .unwrap();
        bag
    }

    #[tokio::test]
    async fn values_wire_every_endpoint_from_the_bag() {
        let params = test_params();
        let releaser = MockReleaser::new();
        let deployer = AppDeployer::new(&releaser, &params);
        let bag = sample_bag().await;

        let values = deployer.build_values(&bag).unwrap();

        assert_eq!(
            values.settings["DOCUMENT_DB_ENDPOINT"],
            "https://skylifttestdocs.example.net"
        );
        assert_eq!(
            values.settings["SEARCH_ENDPOINT"],
            "https://skylifttestsearch.example.net"
        );
        assert_eq!(values.settings["IDENTITY_CLIENT_ID"], "client-123");
        assert_eq!(
            values.image.repository,
            "https://skylifttestacr.example.net/skylift/rag-api"
        );
        assert_eq!(values.image.tag, "latest");
        assert_eq!(values.telemetry_sinks, vec![String::from("console")]);
        assert!(!values.debug);
    }

    #[tokio::test]
    async fn deploy_applies_under_the_fixed_release_name() {
        let params = test_params();
        let bag = sample_bag().await;

        let mut releaser = MockReleaser::new();
        releaser
            .expect_install_or_upgrade()
            .withf(|spec: &ReleaseSpec| {
                spec.release == RELEASE_NAME
                    && spec.namespace == "skylift"
                    && spec.values_yaml.contains("DOCUMENT_DB_ENDPOINT")
            })
            .times(1)
            .returning(|_| Ok(()));

        AppDeployer::new(&releaser, &params).deploy(&bag).await.unwrap();
    }

    #[tokio::test]
    async fn missing_bag_entry_fails_before_the_release_call() {
        let params = test_params();
        let releaser = MockReleaser::new();
        let deployer = AppDeployer::new(&releaser, &params);

        // Empty bag: no install_or_upgrade expectation is set, so any
        // release call would panic the test.
        let err = deployer.deploy(&OutputBag::new()).await.unwrap_err();
        assert!(err.to_string().contains("registry"));
    }

    #[tokio::test]
    async fn rendered_values_parse_back_as_yaml() {
        let params = test_params();
        let releaser = MockReleaser::new();
        let deployer = AppDeployer::new(&releaser, &params);
        let bag = sample_bag().await;

        let values = deployer.build_values(&bag).unwrap();
        let yaml = serde_yaml::to_string(&values).unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        assert!(parsed["settings"]["INFERENCE_ENDPOINT"].is_string());
    }
}
