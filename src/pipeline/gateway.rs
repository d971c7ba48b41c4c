//! Gateway registration.
//!
//! Once readiness is confirmed, fetches the application's current
//! interface description over the network and submits it, together with
//! the resolved backend URL, as a single named API definition on the
//! gateway. Re-registration under the same name replaces.

use tracing::info;

use crate::cloud::plane::ControlPlane;
use crate::cloud::types::ApiDefinitionSpec;
use crate::error::{GatewayError, Result, SkyliftError};
use crate::outputs::{OutputBag, keys};

use super::readiness::{INTERFACE_SPEC_PATH, SpecProbe};

/// The fixed API definition name; the replace-on-rerun key.
pub const API_NAME: &str = "rag-api";

/// Display name shown on the gateway.
const API_DISPLAY_NAME: &str = "Skylift RAG API";

/// URL path the API is mounted under.
const API_PATH: &str = "rag";

/// Registers the deployed application behind the gateway.
#[derive(Debug)]
pub struct GatewayRegistrar<'a, C: ControlPlane> {
    /// Control plane the import call goes to.
    plane: &'a C,
    /// Probe used to fetch the interface description.
    probe: SpecProbe,
}

impl<'a, C: ControlPlane> GatewayRegistrar<'a, C> {
    /// Creates a new registrar.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe HTTP client cannot be created.
    pub fn new(plane: &'a C) -> Result<Self> {
        Ok(Self {
            plane,
            probe: SpecProbe::new()?,
        })
    }

    /// Fetches the interface description from the backend and imports it
    /// as the named API definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the description cannot be fetched or the
    /// gateway rejects the import. Readiness has already been confirmed
    /// at this point, so a fetch failure is terminal, not retried.
    pub async fn register(&self, bag: &OutputBag, backend_url: &str) -> Result<()> {
        let document = self.fetch_description(backend_url).await?;
        let gateway = bag.get(keys::GATEWAY)?;

        let spec = ApiDefinitionSpec {
            gateway_name: gateway.name.clone(),
            api_name: String::from(API_NAME),
            display_name: String::from(API_DISPLAY_NAME),
            path: String::from(API_PATH),
            backend_url: backend_url.to_string(),
            spec_document: document,
        };

        info!(
            "Registering API '{API_NAME}' on gateway '{}' for backend {backend_url}",
            gateway.name
        );

        self.plane.import_api(&spec).await.map_err(|e| {
            SkyliftError::Gateway(GatewayError::ImportRejected {
                api: String::from(API_NAME),
                reason: e.to_string(),
            })
        })
    }

    /// Fetches the interface description, treating any failure as fatal.
    async fn fetch_description(&self, backend_url: &str) -> Result<serde_json::Value> {
        let url = format!("{backend_url}{INTERFACE_SPEC_PATH}");

        self.probe.fetch(backend_url).await?.ok_or_else(|| {
            SkyliftError::Gateway(GatewayError::SpecFetch {
                url,
                message: String::from("endpoint did not answer with a parsable description"),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::provisioner::ResourceProvisioner;
    use crate::pipeline::testing::{FakePlane, test_params};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provisioned_bag(plane: &FakePlane) -> OutputBag {
        let params = test_params();
        let mut bag = OutputBag::new();
        ResourceProvisioner::new(plane, &params)
            .provision(&mut bag)
            .await
            .unwrap();
        bag
    }

    #[tokio::test]
    async fn registers_the_fetched_description_with_the_backend_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openapi.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"openapi": "3.0.0", "paths": {}})),
            )
            .mount(&server)
            .await;

        let plane = FakePlane::new();
        let bag = provisioned_bag(&plane).await;

        GatewayRegistrar::new(&plane)
            .unwrap()
            .register(&bag, &server.uri())
            .await
            .unwrap();

        let imports = plane.imports.lock().unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].api_name, API_NAME);
        assert_eq!(imports[0].backend_url, server.uri());
        assert_eq!(imports[0].gateway_name, "skylift-test-gateway");
        assert_eq!(imports[0].spec_document["openapi"], "3.0.0");
    }

    #[tokio::test]
    async fn an_unanswering_backend_aborts_before_any_import() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let plane = FakePlane::new();
        let bag = provisioned_bag(&plane).await;

        let err = GatewayRegistrar::new(&plane)
            .unwrap()
            .register(&bag, &server.uri())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SkyliftError::Gateway(GatewayError::SpecFetch { .. })
        ));
        assert!(plane.imports.lock().unwrap().is_empty());
    }
}
