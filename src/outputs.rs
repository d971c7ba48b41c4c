//! The output bag: the sole channel for cross-stage data flow.
//!
//! Every provisioning call contributes a small record of typed outputs
//! under its logical resource name. Keys are write-once within a run, and
//! expected fields are validated at the point of write so a missing
//! output surfaces immediately instead of several stages later.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{CloudError, Result, SkyliftError};

/// Logical resource names used as output bag keys.
pub mod keys {
    /// Compute cluster virtual network.
    pub const VNET: &str = "vnet";
    /// Gateway virtual network.
    pub const GATEWAY_VNET: &str = "gateway-vnet";
    /// Runtime identity.
    pub const IDENTITY: &str = "identity";
    /// Document database.
    pub const DOCUMENT_DB: &str = "document-db";
    /// Search index service.
    pub const SEARCH: &str = "search";
    /// Object storage account.
    pub const STORAGE: &str = "storage";
    /// LLM inference endpoint.
    pub const INFERENCE: &str = "inference";
    /// Container registry.
    pub const REGISTRY: &str = "registry";
    /// Managed container cluster.
    pub const CLUSTER: &str = "cluster";
    /// API gateway.
    pub const GATEWAY: &str = "gateway";
    /// Monitoring workspace.
    pub const MONITORING: &str = "monitoring";
}

/// Outputs contributed by one provisioning call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceOutputs {
    /// Cloud-level resource name.
    pub name: String,
    /// Fully qualified resource identifier.
    pub id: String,
    /// Primary endpoint, for resources that expose one.
    pub endpoint: Option<String>,
    /// Principal identifier, for resources that carry an identity.
    pub principal_id: Option<String>,
    /// Additional named outputs (client ids, key names, zone names).
    pub extra: BTreeMap<String, String>,
}

impl ResourceOutputs {
    /// Creates an output record from the two universally required fields.
    #[must_use]
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            endpoint: None,
            principal_id: None,
            extra: BTreeMap::new(),
        }
    }

    /// Sets the primary endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the principal identifier.
    #[must_use]
    pub fn with_principal(mut self, principal_id: impl Into<String>) -> Self {
        self.principal_id = Some(principal_id.into());
        self
    }

    /// Adds an extra named output.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Fields a provisioning call can be required to expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// The record must carry a non-empty endpoint.
    Endpoint,
    /// The record must carry a non-empty principal identifier.
    Principal,
    /// The record must carry the named extra output.
    Extra(&'static str),
}

/// Append-only mapping from logical resource name to its outputs.
///
/// Invariants: a key, once written, is never overwritten within a run;
/// later stages read but never write entries they did not produce.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct OutputBag {
    entries: BTreeMap<String, ResourceOutputs>,
}

impl OutputBag {
    /// Creates an empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a provisioning call's outputs under its logical name,
    /// validating the declared expectations at the point of write.
    ///
    /// # Errors
    ///
    /// Returns an error if the key was already written, if the universal
    /// fields are empty, or if a declared expectation is not met.
    pub fn record(
        &mut self,
        key: &str,
        outputs: ResourceOutputs,
        expectations: &[Expect],
    ) -> Result<()> {
        if self.entries.contains_key(key) {
            return Err(SkyliftError::Cloud(CloudError::DuplicateResource {
                resource: key.to_string(),
            }));
        }

        if outputs.name.is_empty() {
            return Err(missing(key, "name"));
        }
        if outputs.id.is_empty() {
            return Err(missing(key, "id"));
        }

        for expectation in expectations {
            match *expectation {
                Expect::Endpoint => {
                    if outputs.endpoint.as_deref().is_none_or(str::is_empty) {
                        return Err(missing(key, "endpoint"));
                    }
                }
                Expect::Principal => {
                    if outputs.principal_id.as_deref().is_none_or(str::is_empty) {
                        return Err(missing(key, "principal_id"));
                    }
                }
                Expect::Extra(field) => {
                    if outputs.extra.get(field).is_none_or(String::is_empty) {
                        return Err(missing(key, field));
                    }
                }
            }
        }

        self.entries.insert(key.to_string(), outputs);
        Ok(())
    }

    /// Looks up a resource's outputs.
    ///
    /// # Errors
    ///
    /// Returns a named error if no stage produced the key; absence of an
    /// expected entry is always fatal, never an optional value.
    pub fn get(&self, key: &str) -> Result<&ResourceOutputs> {
        self.entries
            .get(key)
            .ok_or_else(|| SkyliftError::Cloud(CloudError::UnknownResource {
                resource: key.to_string(),
            }))
    }

    /// Returns a resource's fully qualified identifier.
    ///
    /// # Errors
    ///
    /// Returns a named error if the key is absent.
    pub fn id(&self, key: &str) -> Result<&str> {
        Ok(self.get(key)?.id.as_str())
    }

    /// Returns a resource's primary endpoint.
    ///
    /// # Errors
    ///
    /// Returns a named error if the key or the endpoint is absent.
    pub fn endpoint(&self, key: &str) -> Result<&str> {
        self.get(key)?
            .endpoint
            .as_deref()
            .ok_or_else(|| missing(key, "endpoint"))
    }

    /// Returns a resource's principal identifier.
    ///
    /// # Errors
    ///
    /// Returns a named error if the key or the principal is absent.
    pub fn principal(&self, key: &str) -> Result<&str> {
        self.get(key)?
            .principal_id
            .as_deref()
            .ok_or_else(|| missing(key, "principal_id"))
    }

    /// Returns an extra named output.
    ///
    /// # Errors
    ///
    /// Returns a named error if the key or the field is absent.
    pub fn extra(&self, key: &str, field: &'static str) -> Result<&str> {
        self.get(key)?
            .extra
            .get(field)
            .map(String::as_str)
            .ok_or_else(|| missing(key, field))
    }

    /// Iterates entries in stable (sorted) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceOutputs)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of recorded resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn missing(resource: &str, field: &'static str) -> SkyliftError {
    SkyliftError::Cloud(CloudError::MissingOutput {
        resource: resource.to_string(),
        field,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ResourceOutputs {
        ResourceOutputs::new("skylift-db", "/subscriptions/s/resourceGroups/g/db")
            .with_endpoint("https://skylift-db.example.net")
    }

    #[test]
    fn record_and_read_back() {
        let mut bag = OutputBag::new();
        bag.record(keys::DOCUMENT_DB, sample(), &[Expect::Endpoint])
            .unwrap();

        assert_eq!(
            bag.endpoint(keys::DOCUMENT_DB).unwrap(),
            "https://skylift-db.example.net"
        );
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn keys_are_write_once() {
        let mut bag = OutputBag::new();
        bag.record(keys::DOCUMENT_DB, sample(), &[]).unwrap();

        let err = bag.record(keys::DOCUMENT_DB, sample(), &[]).unwrap_err();
        assert!(matches!(
            err,
            SkyliftError::Cloud(CloudError::DuplicateResource { .. })
        ));
    }

    #[test]
    fn unknown_key_is_a_named_error() {
        let bag = OutputBag::new();
        let err = bag.get(keys::SEARCH).unwrap_err();
        assert!(err.to_string().contains("search"));
    }

    #[test]
    fn missing_expected_endpoint_fails_at_write() {
        let mut bag = OutputBag::new();
        let no_endpoint = ResourceOutputs::new("skylift-db", "/subscriptions/s/db");

        let err = bag
            .record(keys::DOCUMENT_DB, no_endpoint, &[Expect::Endpoint])
            .unwrap_err();
        assert!(err.to_string().contains("endpoint"));
        assert!(bag.is_empty());
    }

    #[test]
    fn missing_expected_principal_fails_at_write() {
        let mut bag = OutputBag::new();
        let err = bag
            .record(keys::IDENTITY, sample(), &[Expect::Principal])
            .unwrap_err();
        assert!(err.to_string().contains("principal_id"));
    }

    #[test]
    fn missing_expected_extra_fails_at_write() {
        let mut bag = OutputBag::new();
        let err = bag
            .record(keys::IDENTITY, sample(), &[Expect::Extra("client_id")])
            .unwrap_err();
        assert!(err.to_string().contains("client_id"));
    }

    #[test]
    fn empty_id_is_rejected() {
        let mut bag = OutputBag::new();
        let err = bag
            .record(keys::VNET, ResourceOutputs::new("net", ""), &[])
            .unwrap_err();
        assert!(err.to_string().contains("id"));
    }
}
