//! Access-grant propagation.
//!
//! Binds the cluster's runtime principal (and, in developer mode, the
//! invoking operator) to each data/service resource at the minimal
//! necessary scope. Assignment identifiers are a pure function of
//! (scope, principal, principal kind, role), so resubmitting the same
//! grant is a no-op instead of a duplicate.

use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cloud::plane::ControlPlane;
use crate::cloud::types::{PrincipalKind, RoleAssignmentSpec, RoleDefinitionSpec};
use crate::error::{RbacError, Result, SkyliftError};
use crate::outputs::{OutputBag, keys};

/// Built-in role: search index data contributor.
const ROLE_SEARCH_DATA: &str = "8ebe5a00-799e-43f5-93ac-243d3dce84a7";

/// Built-in role: storage blob data contributor.
const ROLE_BLOB_DATA: &str = "ba92f5b4-2d11-453d-a403-e96b0029c9fe";

/// Built-in role: inference model user.
const ROLE_INFERENCE_USER: &str = "5e0bd9bd-7b93-4f28-af87-19fc36ad61bd";

/// Built-in role: registry image pull.
const ROLE_REGISTRY_PULL: &str = "7f951dda-4ed3-4680-a7ca-43fe172d538d";

/// Built-in role: document db data contributor. Only used under
/// [`RolePolicy::BuiltIn`].
const ROLE_DOCUMENT_DATA_BUILTIN: &str = "00000000-0000-0000-0000-000000000002";

/// Name of the custom document db role.
const DOCUMENT_ROLE_NAME: &str = "skylift-document-contributor";

/// The custom role's permission surface, enumerated explicitly rather
/// than inherited from the built-in role.
const DOCUMENT_ROLE_PERMISSIONS: &[&str] = &[
    "Microsoft.DocumentDB/databaseAccounts/readMetadata",
    "Microsoft.DocumentDB/databaseAccounts/sqlDatabases/containers/executeQuery",
    "Microsoft.DocumentDB/databaseAccounts/sqlDatabases/containers/readChangeFeed",
    "Microsoft.DocumentDB/databaseAccounts/sqlDatabases/containers/items/*",
];

/// Management-plane grants: (logical resource, role id, role label).
const GRANTS: &[(&str, &str, &str)] = &[
    (keys::SEARCH, ROLE_SEARCH_DATA, "search index data contributor"),
    (keys::STORAGE, ROLE_BLOB_DATA, "storage blob data contributor"),
    (keys::INFERENCE, ROLE_INFERENCE_USER, "inference model user"),
    (keys::REGISTRY, ROLE_REGISTRY_PULL, "registry image pull"),
];

/// How the document db grant is expressed.
///
/// The data-store assignment backend races when a built-in role is
/// assigned immediately after account creation, so the default policy
/// converges a custom definition with an equivalent, explicitly
/// enumerated permission set. Backends without that defect can select
/// the built-in role instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RolePolicy {
    /// Converge and assign a custom role definition.
    #[default]
    CustomDefinition,
    /// Assign the built-in data contributor role.
    BuiltIn,
}

/// Derives the deterministic assignment identifier for a grant.
///
/// The identifier is a pure function of its inputs: the same
/// (scope, principal, kind, role) always maps to the same GUID, and any
/// change to an input changes the GUID.
#[must_use]
pub fn assignment_guid(scope: &str, principal: &str, kind: PrincipalKind, role: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    hasher.update(b"|");
    hasher.update(principal.as_bytes());
    hasher.update(b"|");
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"|");
    hasher.update(role.as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}

/// Propagates role assignments for the provisioned topology.
#[derive(Debug)]
pub struct RbacPropagator<'a, C: ControlPlane> {
    /// Control plane the grant calls go to.
    plane: &'a C,
    /// Document db grant policy.
    policy: RolePolicy,
}

impl<'a, C: ControlPlane> RbacPropagator<'a, C> {
    /// Creates a propagator with the default (custom definition) policy.
    #[must_use]
    pub const fn new(plane: &'a C) -> Self {
        Self {
            plane,
            policy: RolePolicy::CustomDefinition,
        }
    }

    /// Overrides the document db grant policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: RolePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Grants the cluster's runtime principal access to every data and
    /// service resource it consumes.
    ///
    /// # Errors
    ///
    /// Returns an error if any grant call fails; failures are terminal
    /// for the run.
    pub async fn propagate(&self, bag: &OutputBag) -> Result<()> {
        let principal = bag.principal(keys::CLUSTER)?.to_string();
        info!("Propagating grants for cluster principal {principal}");

        self.grant_data_roles(bag, &principal, PrincipalKind::ServicePrincipal)
            .await
    }

    /// Grants the invoking operator the same data-plane roles
    /// (developer mode).
    ///
    /// # Errors
    ///
    /// Returns an error if the operator principal is empty or a grant
    /// call fails.
    pub async fn grant_operator(&self, bag: &OutputBag, operator_object_id: &str) -> Result<()> {
        if operator_object_id.is_empty() {
            return Err(SkyliftError::Rbac(RbacError::MissingOperator));
        }

        info!("Granting operator {operator_object_id} direct data-plane access");
        self.grant_data_roles(bag, operator_object_id, PrincipalKind::User)
            .await
    }

    /// Issues the full grant table for one principal.
    async fn grant_data_roles(
        &self,
        bag: &OutputBag,
        principal: &str,
        kind: PrincipalKind,
    ) -> Result<()> {
        self.grant_document_db(bag, principal, kind).await?;

        for &(resource, role_id, label) in GRANTS {
            let scope = bag.id(resource)?;
            let spec = RoleAssignmentSpec {
                assignment_id: assignment_guid(scope, principal, kind, role_id),
                scope: scope.to_string(),
                principal_id: principal.to_string(),
                principal_kind: kind,
                role_definition_id: role_id.to_string(),
                data_plane: false,
            };

            debug!("Granting {label} on {resource}");
            self.plane.ensure_role_assignment(&spec).await.map_err(|e| {
                SkyliftError::Rbac(RbacError::GrantFailed {
                    role: label.to_string(),
                    resource: resource.to_string(),
                    reason: e.to_string(),
                })
            })?;
        }

        Ok(())
    }

    /// Grants document db data access under the configured policy.
    async fn grant_document_db(
        &self,
        bag: &OutputBag,
        principal: &str,
        kind: PrincipalKind,
    ) -> Result<()> {
        let scope = bag.id(keys::DOCUMENT_DB)?.to_string();

        let role_definition_id = match self.policy {
            RolePolicy::CustomDefinition => {
                let definition = RoleDefinitionSpec {
                    definition_id: assignment_guid(
                        &scope,
                        DOCUMENT_ROLE_NAME,
                        PrincipalKind::ServicePrincipal,
                        "definition",
                    ),
                    name: String::from(DOCUMENT_ROLE_NAME),
                    scope: scope.clone(),
                    permissions: DOCUMENT_ROLE_PERMISSIONS
                        .iter()
                        .map(|p| (*p).to_string())
                        .collect(),
                };

                let outputs =
                    self.plane
                        .ensure_role_definition(&definition)
                        .await
                        .map_err(|e| {
                            SkyliftError::Rbac(RbacError::DefinitionFailed {
                                name: String::from(DOCUMENT_ROLE_NAME),
                                reason: e.to_string(),
                            })
                        })?;
                outputs.id
            }
            RolePolicy::BuiltIn => String::from(ROLE_DOCUMENT_DATA_BUILTIN),
        };

        let spec = RoleAssignmentSpec {
            assignment_id: assignment_guid(&scope, principal, kind, &role_definition_id),
            scope: scope.clone(),
            principal_id: principal.to_string(),
            principal_kind: kind,
            role_definition_id,
            data_plane: true,
        };

        debug!("Granting document data access on {scope}");
        self.plane.ensure_role_assignment(&spec).await.map_err(|e| {
            SkyliftError::Rbac(RbacError::GrantFailed {
                role: String::from(DOCUMENT_ROLE_NAME),
                resource: String::from(keys::DOCUMENT_DB),
                reason: e.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamContext;
    use crate::pipeline::provisioner::ResourceProvisioner;
    use crate::pipeline::testing::{FakePlane, test_params};

    async fn provisioned_bag(plane: &FakePlane, params: &ParamContext) -> OutputBag {
        let mut bag = OutputBag::new();
        ResourceProvisioner::new(plane, params)
            .provision(&mut bag)
            .await
            .unwrap();
        bag
    }

    #[test]
    fn assignment_guid_is_deterministic() {
        let a = assignment_guid("/s/1", "p-1", PrincipalKind::ServicePrincipal, "role-a");
        let b = assignment_guid("/s/1", "p-1", PrincipalKind::ServicePrincipal, "role-a");
        assert_eq!(a, b);
    }

    #[test]
    fn assignment_guid_separates_triples() {
        let base = assignment_guid("/s/1", "p-1", PrincipalKind::ServicePrincipal, "role-a");

        assert_ne!(
            base,
            assignment_guid("/s/2", "p-1", PrincipalKind::ServicePrincipal, "role-a")
        );
        assert_ne!(
            base,
            assignment_guid("/s/1", "p-2", PrincipalKind::ServicePrincipal, "role-a")
        );
        assert_ne!(
            base,
            assignment_guid("/s/1", "p-1", PrincipalKind::User, "role-a")
        );
        assert_ne!(
            base,
            assignment_guid("/s/1", "p-1", PrincipalKind::ServicePrincipal, "role-b")
        );
    }

    #[tokio::test]
    async fn propagates_one_grant_per_table_row() {
        let plane = FakePlane::new();
        let params = test_params();
        let bag = provisioned_bag(&plane, &params).await;

        RbacPropagator::new(&plane).propagate(&bag).await.unwrap();

        let assignments = plane.assignments.lock().unwrap();
        // Document db plus the four management-plane grants.
        assert_eq!(assignments.len(), 5);
        assert_eq!(assignments.iter().filter(|a| a.data_plane).count(), 1);
        assert!(assignments.iter().all(|a| a.principal_id == "principal-kubelet"));
    }

    #[tokio::test]
    async fn double_submission_reuses_the_same_identifiers() {
        let plane = FakePlane::new();
        let params = test_params();
        let bag = provisioned_bag(&plane, &params).await;

        let propagator = RbacPropagator::new(&plane);
        propagator.propagate(&bag).await.unwrap();
        propagator.propagate(&bag).await.unwrap();

        let assignments = plane.assignments.lock().unwrap();
        assert_eq!(assignments.len(), 10);

        // Deterministic ids: the second run resubmits the exact same
        // five grants, so the id set does not grow.
        let mut ids: Vec<&str> = assignments.iter().map(|a| a.assignment_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn custom_policy_converges_a_definition_first() {
        let plane = FakePlane::new();
        let params = test_params();
        let bag = provisioned_bag(&plane, &params).await;

        RbacPropagator::new(&plane).propagate(&bag).await.unwrap();

        assert!(
            plane
                .call_log()
                .iter()
                .any(|c| c.starts_with("ensure_role_definition"))
        );

        let assignments = plane.assignments.lock().unwrap();
        let data_plane = assignments.iter().find(|a| a.data_plane).unwrap();
        assert!(data_plane.role_definition_id.contains("sqlRoleDefinitions"));
    }

    #[tokio::test]
    async fn builtin_policy_skips_the_definition() {
        let plane = FakePlane::new();
        let params = test_params();
        let bag = provisioned_bag(&plane, &params).await;

        RbacPropagator::new(&plane)
            .with_policy(RolePolicy::BuiltIn)
            .propagate(&bag)
            .await
            .unwrap();

        assert!(
            !plane
                .call_log()
                .iter()
                .any(|c| c.starts_with("ensure_role_definition"))
        );

        let assignments = plane.assignments.lock().unwrap();
        let data_plane = assignments.iter().find(|a| a.data_plane).unwrap();
        assert_eq!(data_plane.role_definition_id, ROLE_DOCUMENT_DATA_BUILTIN);
    }

    #[tokio::test]
    async fn operator_grants_use_the_user_principal_kind() {
        let plane = FakePlane::new();
        let params = test_params();
        let bag = provisioned_bag(&plane, &params).await;

        RbacPropagator::new(&plane)
            .grant_operator(&bag, "operator-42")
            .await
            .unwrap();

        let assignments = plane.assignments.lock().unwrap();
        assert!(assignments.iter().all(|a| a.principal_id == "operator-42"));
        assert!(
            assignments
                .iter()
                .filter(|a| !a.data_plane)
                .all(|a| a.principal_kind == PrincipalKind::User)
        );
    }

    #[tokio::test]
    async fn empty_operator_is_rejected() {
        let plane = FakePlane::new();
        let params = test_params();
        let bag = provisioned_bag(&plane, &params).await;

        let err = RbacPropagator::new(&plane)
            .grant_operator(&bag, "")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SkyliftError::Rbac(RbacError::MissingOperator)
        ));
    }
}
