//! The control-plane boundary the pipeline is written against.
//!
//! [`ControlPlane`] is the seam between the orchestration logic and the
//! cloud: one method per resource kind, each a thin idempotent wrapper
//! that converges a single resource and returns its declared outputs.
//! The production implementation lives on [`ArmClient`]; tests substitute
//! recording fakes.

use async_trait::async_trait;
use base64::Engine as _;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{CloudError, Result, SkyliftError};
use crate::outputs::ResourceOutputs;

use super::client::ArmClient;
use super::types::{
    ApiDefinitionSpec, ClusterSpec, DocumentDbSpec, GatewaySpec, IdentitySpec, InferenceSpec,
    MonitoringSpec, NetworkSpec, PeeringSpec, RegistrySpec, RoleAssignmentSpec,
    RoleDefinitionSpec, SearchSpec, StorageSpec, ZoneLinkSpec,
};

const API_NETWORK: &str = "2024-05-01";
const API_IDENTITY: &str = "2023-01-31";
const API_DOCUMENT_DB: &str = "2024-05-15";
const API_SEARCH: &str = "2023-11-01";
const API_STORAGE: &str = "2023-05-01";
const API_INFERENCE: &str = "2024-10-01";
const API_REGISTRY: &str = "2023-07-01";
const API_CLUSTER: &str = "2024-05-01";
const API_GATEWAY: &str = "2023-05-01-preview";
const API_MONITORING: &str = "2023-09-01";
const API_AUTHORIZATION: &str = "2022-04-01";
const API_PRIVATE_DNS: &str = "2020-06-01";

/// Idempotent ensure calls against the cloud control plane.
///
/// Invoking any method twice with the same spec must not create two
/// resources and must return the same outputs both times.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Ensures a virtual network exists with the given address layout.
    async fn ensure_network(&self, spec: &NetworkSpec) -> Result<ResourceOutputs>;

    /// Ensures a user-assigned runtime identity exists.
    async fn ensure_identity(&self, spec: &IdentitySpec) -> Result<ResourceOutputs>;

    /// Ensures the document database account exists.
    async fn ensure_document_db(&self, spec: &DocumentDbSpec) -> Result<ResourceOutputs>;

    /// Ensures the search service exists.
    async fn ensure_search(&self, spec: &SearchSpec) -> Result<ResourceOutputs>;

    /// Ensures the object storage account exists.
    async fn ensure_storage(&self, spec: &StorageSpec) -> Result<ResourceOutputs>;

    /// Ensures the LLM inference account and its model deployments exist.
    async fn ensure_inference(&self, spec: &InferenceSpec) -> Result<ResourceOutputs>;

    /// Ensures the container registry exists.
    async fn ensure_registry(&self, spec: &RegistrySpec) -> Result<ResourceOutputs>;

    /// Ensures the managed container cluster exists.
    async fn ensure_cluster(&self, spec: &ClusterSpec) -> Result<ResourceOutputs>;

    /// Ensures the API gateway service exists.
    async fn ensure_gateway(&self, spec: &GatewaySpec) -> Result<ResourceOutputs>;

    /// Ensures the monitoring workspace exists.
    async fn ensure_monitoring(&self, spec: &MonitoringSpec) -> Result<ResourceOutputs>;

    /// Ensures a custom role definition exists on the document db.
    async fn ensure_role_definition(&self, spec: &RoleDefinitionSpec) -> Result<ResourceOutputs>;

    /// Ensures a role assignment exists. Resubmitting the same
    /// deterministic assignment id is a no-op.
    async fn ensure_role_assignment(&self, spec: &RoleAssignmentSpec) -> Result<()>;

    /// Ensures a one-directional network peering exists.
    async fn ensure_peering(&self, spec: &PeeringSpec) -> Result<()>;

    /// Ensures a private resolution zone exists.
    async fn ensure_private_zone(&self, zone: &str) -> Result<ResourceOutputs>;

    /// Ensures a zone-to-network link exists.
    async fn ensure_zone_link(&self, spec: &ZoneLinkSpec) -> Result<()>;

    /// Creates or replaces the named API definition on the gateway.
    async fn import_api(&self, spec: &ApiDefinitionSpec) -> Result<()>;

    /// Fetches user credentials (kubeconfig) for the cluster.
    async fn cluster_credentials(&self, cluster_name: &str) -> Result<String>;
}

/// Extracts the mandatory resource id from a control-plane response.
fn body_id(body: &serde_json::Value) -> Result<String> {
    body["id"].as_str().map(str::to_string).ok_or_else(|| {
        SkyliftError::Cloud(CloudError::InvalidResponse {
            message: String::from("Response carries no resource id"),
        })
    })
}

/// Reads an optional string at a JSON pointer.
fn pointer_str(body: &serde_json::Value, pointer: &str) -> Option<String> {
    body.pointer(pointer)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl ControlPlane for ArmClient {
    async fn ensure_network(&self, spec: &NetworkSpec) -> Result<ResourceOutputs> {
        info!("Ensuring virtual network: {}", spec.name);

        let subnets: Vec<serde_json::Value> = spec
            .subnets
            .iter()
            .map(|s| json!({"name": s.name, "properties": {"addressPrefix": s.prefix}}))
            .collect();

        let path = format!(
            "{}/providers/Microsoft.Network/virtualNetworks/{}",
            self.group_path(),
            spec.name
        );
        let body = json!({
            "location": self.location(),
            "properties": {
                "addressSpace": {"addressPrefixes": [spec.address_space]},
                "subnets": subnets,
            }
        });

        let response = self.put(&path, API_NETWORK, &body).await?;
        Ok(ResourceOutputs::new(&spec.name, body_id(&response)?))
    }

    async fn ensure_identity(&self, spec: &IdentitySpec) -> Result<ResourceOutputs> {
        info!("Ensuring runtime identity: {}", spec.name);

        let path = format!(
            "{}/providers/Microsoft.ManagedIdentity/userAssignedIdentities/{}",
            self.group_path(),
            spec.name
        );
        let body = json!({"location": self.location()});

        let response = self.put(&path, API_IDENTITY, &body).await?;
        let mut outputs = ResourceOutputs::new(&spec.name, body_id(&response)?);

        if let Some(principal) = pointer_str(&response, "/properties/principalId") {
            outputs = outputs.with_principal(principal);
        }
        if let Some(client_id) = pointer_str(&response, "/properties/clientId") {
            outputs = outputs.with_extra("client_id", client_id);
        }

        Ok(outputs)
    }

    async fn ensure_document_db(&self, spec: &DocumentDbSpec) -> Result<ResourceOutputs> {
        info!("Ensuring document database: {}", spec.name);

        let path = format!(
            "{}/providers/Microsoft.DocumentDB/databaseAccounts/{}",
            self.group_path(),
            spec.name
        );
        let body = json!({
            "location": self.location(),
            "kind": "GlobalDocumentDB",
            "properties": {
                "databaseAccountOfferType": "Standard",
                "consistencyPolicy": {"defaultConsistencyLevel": spec.consistency},
                "locations": [{"locationName": self.location(), "failoverPriority": 0}],
            }
        });

        let response = self.put(&path, API_DOCUMENT_DB, &body).await?;
        let mut outputs = ResourceOutputs::new(&spec.name, body_id(&response)?);

        if let Some(endpoint) = pointer_str(&response, "/properties/documentEndpoint") {
            outputs = outputs.with_endpoint(endpoint);
        }

        Ok(outputs)
    }

    async fn ensure_search(&self, spec: &SearchSpec) -> Result<ResourceOutputs> {
        info!("Ensuring search service: {}", spec.name);

        let path = format!(
            "{}/providers/Microsoft.Search/searchServices/{}",
            self.group_path(),
            spec.name
        );
        let body = json!({
            "location": self.location(),
            "sku": {"name": spec.sku},
            "properties": {"hostingMode": "default"},
        });

        let response = self.put(&path, API_SEARCH, &body).await?;

        // The search control plane does not echo an endpoint; it is a
        // documented function of the service name.
        Ok(ResourceOutputs::new(&spec.name, body_id(&response)?)
            .with_endpoint(format!("https://{}.search.windows.net", spec.name)))
    }

    async fn ensure_storage(&self, spec: &StorageSpec) -> Result<ResourceOutputs> {
        info!("Ensuring storage account: {}", spec.name);

        let path = format!(
            "{}/providers/Microsoft.Storage/storageAccounts/{}",
            self.group_path(),
            spec.name
        );
        let body = json!({
            "location": self.location(),
            "sku": {"name": "Standard_LRS"},
            "kind": "StorageV2",
            "properties": {"allowBlobPublicAccess": false},
        });

        let response = self.put(&path, API_STORAGE, &body).await?;
        let endpoint = pointer_str(&response, "/properties/primaryEndpoints/blob")
            .unwrap_or_else(|| format!("https://{}.blob.{}", spec.name, spec.endpoint_suffix));

        Ok(ResourceOutputs::new(&spec.name, body_id(&response)?).with_endpoint(endpoint))
    }

    async fn ensure_inference(&self, spec: &InferenceSpec) -> Result<ResourceOutputs> {
        info!("Ensuring inference account: {}", spec.name);

        let path = format!(
            "{}/providers/Microsoft.CognitiveServices/accounts/{}",
            self.group_path(),
            spec.name
        );
        let body = json!({
            "location": self.location(),
            "kind": "OpenAI",
            "sku": {"name": "S0"},
            "properties": {"customSubDomainName": spec.name},
        });

        let response = self.put(&path, API_INFERENCE, &body).await?;
        let account_id = body_id(&response)?;

        for deployment in &spec.deployments {
            debug!("Ensuring model deployment: {}", deployment.name);
            let deployment_path = format!("{path}/deployments/{}", deployment.name);
            let deployment_body = json!({
                "sku": {"name": "Standard", "capacity": deployment.capacity},
                "properties": {
                    "model": {"format": "OpenAI", "name": deployment.model},
                }
            });
            self.put(&deployment_path, API_INFERENCE, &deployment_body)
                .await?;
        }

        let endpoint = pointer_str(&response, "/properties/endpoint")
            .unwrap_or_else(|| format!("https://{}.openai.azure.com", spec.name));

        Ok(ResourceOutputs::new(&spec.name, account_id).with_endpoint(endpoint))
    }

    async fn ensure_registry(&self, spec: &RegistrySpec) -> Result<ResourceOutputs> {
        info!("Ensuring container registry: {}", spec.name);

        let path = format!(
            "{}/providers/Microsoft.ContainerRegistry/registries/{}",
            self.group_path(),
            spec.name
        );
        let body = json!({
            "location": self.location(),
            "sku": {"name": "Basic"},
            "properties": {"adminUserEnabled": false},
        });

        let response = self.put(&path, API_REGISTRY, &body).await?;
        let endpoint = pointer_str(&response, "/properties/loginServer")
            .unwrap_or_else(|| format!("{}.azurecr.io", spec.name));

        Ok(ResourceOutputs::new(&spec.name, body_id(&response)?).with_endpoint(endpoint))
    }

    async fn ensure_cluster(&self, spec: &ClusterSpec) -> Result<ResourceOutputs> {
        info!("Ensuring container cluster: {}", spec.name);

        let path = format!(
            "{}/providers/Microsoft.ContainerService/managedClusters/{}",
            self.group_path(),
            spec.name
        );
        let mut identities = serde_json::Map::new();
        identities.insert(spec.identity_id.clone(), json!({}));

        let body = json!({
            "location": self.location(),
            "identity": {
                "type": "UserAssigned",
                "userAssignedIdentities": identities,
            },
            "properties": {
                "dnsPrefix": spec.name,
                "agentPoolProfiles": [{
                    "name": "system",
                    "mode": "System",
                    "count": spec.node_count,
                    "vmSize": spec.node_size,
                    "vnetSubnetID": spec.subnet_id,
                }],
            }
        });

        let response = self.put(&path, API_CLUSTER, &body).await?;
        let mut outputs = ResourceOutputs::new(&spec.name, body_id(&response)?);

        // The kubelet identity is the principal workloads act as.
        if let Some(principal) = pointer_str(
            &response,
            "/properties/identityProfile/kubeletidentity/objectId",
        ) {
            outputs = outputs.with_principal(principal);
        }

        Ok(outputs)
    }

    async fn ensure_gateway(&self, spec: &GatewaySpec) -> Result<ResourceOutputs> {
        info!("Ensuring API gateway: {}", spec.name);

        let path = format!(
            "{}/providers/Microsoft.ApiManagement/service/{}",
            self.group_path(),
            spec.name
        );
        let mut properties = json!({
            "publisherEmail": spec.publisher_email,
            "publisherName": spec.publisher_name,
        });
        if let Some(subnet_id) = &spec.subnet_id {
            properties["virtualNetworkType"] = json!("External");
            properties["virtualNetworkConfiguration"] = json!({"subnetResourceId": subnet_id});
        }
        let body = json!({
            "location": self.location(),
            "sku": {"name": spec.tier, "capacity": spec.capacity},
            "properties": properties,
        });

        let response = self.put(&path, API_GATEWAY, &body).await?;
        let endpoint = pointer_str(&response, "/properties/gatewayUrl")
            .unwrap_or_else(|| format!("https://{}.azure-api.net", spec.name));

        Ok(ResourceOutputs::new(&spec.name, body_id(&response)?).with_endpoint(endpoint))
    }

    async fn ensure_monitoring(&self, spec: &MonitoringSpec) -> Result<ResourceOutputs> {
        info!("Ensuring monitoring workspace: {}", spec.name);

        let path = format!(
            "{}/providers/Microsoft.OperationalInsights/workspaces/{}",
            self.group_path(),
            spec.name
        );
        let body = json!({
            "location": self.location(),
            "properties": {"retentionInDays": spec.retention_days},
        });

        let response = self.put(&path, API_MONITORING, &body).await?;
        Ok(ResourceOutputs::new(&spec.name, body_id(&response)?))
    }

    async fn ensure_role_definition(&self, spec: &RoleDefinitionSpec) -> Result<ResourceOutputs> {
        info!("Ensuring custom role definition: {}", spec.name);

        let path = format!("{}/sqlRoleDefinitions/{}", spec.scope, spec.definition_id);
        let body = json!({
            "properties": {
                "roleName": spec.name,
                "type": "CustomRole",
                "assignableScopes": [spec.scope],
                "permissions": [{"dataActions": spec.permissions}],
            }
        });

        let response = self.put(&path, API_DOCUMENT_DB, &body).await?;
        Ok(ResourceOutputs::new(&spec.name, body_id(&response)?))
    }

    async fn ensure_role_assignment(&self, spec: &RoleAssignmentSpec) -> Result<()> {
        debug!(
            "Ensuring role assignment {} on {}",
            spec.assignment_id, spec.scope
        );

        let (path, api_version, body) = if spec.data_plane {
            (
                format!("{}/sqlRoleAssignments/{}", spec.scope, spec.assignment_id),
                API_DOCUMENT_DB,
                json!({
                    "properties": {
                        "roleDefinitionId": spec.role_definition_id,
                        "principalId": spec.principal_id,
                        "scope": spec.scope,
                    }
                }),
            )
        } else {
            (
                format!(
                    "{}/providers/Microsoft.Authorization/roleAssignments/{}",
                    spec.scope, spec.assignment_id
                ),
                API_AUTHORIZATION,
                json!({
                    "properties": {
                        "roleDefinitionId": spec.role_definition_id,
                        "principalId": spec.principal_id,
                        "principalType": spec.principal_kind.as_str(),
                    }
                }),
            )
        };

        match self.put(&path, api_version, &body).await {
            Ok(_) => Ok(()),
            // The assignment backend answers a repeat submission of the
            // same deterministic id with a conflict; the grant already
            // holds, so the call has converged.
            Err(SkyliftError::Cloud(CloudError::RequestFailed { status: 409, .. })) => {
                debug!("Role assignment {} already exists", spec.assignment_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn ensure_peering(&self, spec: &PeeringSpec) -> Result<()> {
        info!(
            "Ensuring network peering: {} ({} -> remote)",
            spec.name, spec.source_network
        );

        let path = format!(
            "{}/providers/Microsoft.Network/virtualNetworks/{}/virtualNetworkPeerings/{}",
            self.group_path(),
            spec.source_network,
            spec.name
        );
        let body = json!({
            "properties": {
                "remoteVirtualNetwork": {"id": spec.target_network_id},
                "allowVirtualNetworkAccess": true,
                "allowForwardedTraffic": true,
            }
        });

        self.put(&path, API_NETWORK, &body).await?;
        Ok(())
    }

    async fn ensure_private_zone(&self, zone: &str) -> Result<ResourceOutputs> {
        info!("Ensuring private resolution zone: {zone}");

        let path = format!(
            "{}/providers/Microsoft.Network/privateDnsZones/{zone}",
            self.group_path()
        );
        let body = json!({"location": "global"});

        let response = self.put(&path, API_PRIVATE_DNS, &body).await?;
        Ok(ResourceOutputs::new(zone, body_id(&response)?))
    }

    async fn ensure_zone_link(&self, spec: &ZoneLinkSpec) -> Result<()> {
        debug!("Ensuring zone link {} for {}", spec.link_name, spec.zone);

        let path = format!(
            "{}/providers/Microsoft.Network/privateDnsZones/{}/virtualNetworkLinks/{}",
            self.group_path(),
            spec.zone,
            spec.link_name
        );
        let body = json!({
            "location": "global",
            "properties": {
                "virtualNetwork": {"id": spec.network_id},
                "registrationEnabled": false,
            }
        });

        self.put(&path, API_PRIVATE_DNS, &body).await?;
        Ok(())
    }

    async fn import_api(&self, spec: &ApiDefinitionSpec) -> Result<()> {
        info!(
            "Importing API '{}' on gateway {}",
            spec.api_name, spec.gateway_name
        );

        let path = format!(
            "{}/providers/Microsoft.ApiManagement/service/{}/apis/{}",
            self.group_path(),
            spec.gateway_name,
            spec.api_name
        );
        let value = serde_json::to_string(&spec.spec_document).map_err(|e| {
            SkyliftError::Cloud(CloudError::InvalidResponse {
                message: format!("Failed to serialize interface description: {e}"),
            })
        })?;
        let body = json!({
            "properties": {
                "format": "openapi+json",
                "value": value,
                "path": spec.path,
                "displayName": spec.display_name,
                "serviceUrl": spec.backend_url,
                "protocols": ["https"],
            }
        });

        self.put(&path, API_GATEWAY, &body).await?;
        Ok(())
    }

    async fn cluster_credentials(&self, cluster_name: &str) -> Result<String> {
        info!("Fetching cluster credentials for {cluster_name}");

        let path = format!(
            "{}/providers/Microsoft.ContainerService/managedClusters/{cluster_name}/listClusterUserCredential",
            self.group_path()
        );

        let response = self.post(&path, API_CLUSTER, &json!({})).await?;
        let encoded = pointer_str(&response, "/kubeconfigs/0/value").ok_or_else(|| {
            SkyliftError::Cloud(CloudError::InvalidResponse {
                message: String::from("Credential response carries no kubeconfig"),
            })
        })?;

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| {
                SkyliftError::Cloud(CloudError::InvalidResponse {
                    message: format!("Kubeconfig payload is not base64: {e}"),
                })
            })?;

        String::from_utf8(decoded).map_err(|e| {
            SkyliftError::Cloud(CloudError::InvalidResponse {
                message: format!("Kubeconfig payload is not UTF-8: {e}"),
            })
        })
    }
}
