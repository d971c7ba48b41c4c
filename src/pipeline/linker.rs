//! Network and private-resolution linking.
//!
//! Runs only when private connectivity is requested. Peering is not
//! automatically symmetric, so both unidirectional links are issued;
//! every private resolution zone is then linked to both networks. Names
//! are deterministic functions of the endpoints, so re-issuing against
//! an already-linked pair converges instead of duplicating.

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::cloud::plane::ControlPlane;
use crate::cloud::types::{PeeringSpec, ZoneLinkSpec};
use crate::error::{LinkError, Result, SkyliftError};
use crate::outputs::{OutputBag, keys};

/// Private resolution zones needed by the data/service resources.
const PRIVATE_ZONES: &[&str] = &[
    "privatelink.documents.azure.com",
    "privatelink.search.windows.net",
    "privatelink.blob.core.windows.net",
    "privatelink.openai.azure.com",
    "privatelink.azurecr.io",
];

/// Establishes reachability and name resolution between the gateway and
/// cluster networks.
#[derive(Debug)]
pub struct NetworkLinker<'a, C: ControlPlane> {
    /// Control plane the link calls go to.
    plane: &'a C,
}

impl<'a, C: ControlPlane> NetworkLinker<'a, C> {
    /// Creates a new linker.
    #[must_use]
    pub const fn new(plane: &'a C) -> Self {
        Self { plane }
    }

    /// Links the two networks in both directions and binds every private
    /// resolution zone to both.
    ///
    /// # Errors
    ///
    /// Returns an error if any peering or zone-link call fails.
    pub async fn link(&self, bag: &OutputBag) -> Result<()> {
        let cluster_net = bag.get(keys::VNET)?;
        let gateway_net = bag.get(keys::GATEWAY_VNET)?;

        info!(
            "Linking networks {} <-> {}",
            cluster_net.name, gateway_net.name
        );

        self.peer(&cluster_net.name, &gateway_net.name, &gateway_net.id)
            .await?;
        self.peer(&gateway_net.name, &cluster_net.name, &cluster_net.id)
            .await?;

        for &zone in PRIVATE_ZONES {
            self.plane.ensure_private_zone(zone).await.map_err(|e| {
                SkyliftError::Link(LinkError::ZoneLinkFailed {
                    zone: zone.to_string(),
                    network: String::from("-"),
                    reason: e.to_string(),
                })
            })?;

            for network in [cluster_net, gateway_net] {
                let spec = ZoneLinkSpec {
                    zone: zone.to_string(),
                    link_name: link_name(zone, &network.id),
                    network_id: network.id.clone(),
                };

                debug!("Linking zone {zone} to {}", network.name);
                self.plane.ensure_zone_link(&spec).await.map_err(|e| {
                    SkyliftError::Link(LinkError::ZoneLinkFailed {
                        zone: zone.to_string(),
                        network: network.name.clone(),
                        reason: e.to_string(),
                    })
                })?;
            }
        }

        Ok(())
    }

    /// Issues one peering direction.
    async fn peer(&self, source: &str, target: &str, target_id: &str) -> Result<()> {
        let spec = PeeringSpec {
            name: peering_name(source, target),
            source_network: source.to_string(),
            target_network_id: target_id.to_string(),
        };

        self.plane.ensure_peering(&spec).await.map_err(|e| {
            SkyliftError::Link(LinkError::PeeringFailed {
                source_network: source.to_string(),
                target: target.to_string(),
                reason: e.to_string(),
            })
        })
    }
}

/// Deterministic peering name for one direction.
fn peering_name(source: &str, target: &str) -> String {
    format!("peer-{source}-to-{target}")
}

/// Deterministic zone-link name derived from the zone and network id.
fn link_name(zone: &str, network_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(zone.as_bytes());
    hasher.update(b"|");
    hasher.update(network_id.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("link-{}", &digest[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::provisioner::ResourceProvisioner;
    use crate::pipeline::testing::{FakePlane, test_params};

    async fn linked_plane() -> FakePlane {
        let plane = FakePlane::new();
        let params = test_params();
        let mut bag = crate::outputs::OutputBag::new();
        ResourceProvisioner::new(&plane, &params)
            .provision(&mut bag)
            .await
            .unwrap();

        NetworkLinker::new(&plane).link(&bag).await.unwrap();
        plane
    }

    #[tokio::test]
    async fn peers_both_directions() {
        let plane = linked_plane().await;
        let peerings = plane.peerings.lock().unwrap();

        assert_eq!(peerings.len(), 2);
        assert_eq!(
            peerings[0].name,
            peering_name("skylift-test-vnet", "skylift-test-gw-vnet")
        );
        assert_eq!(
            peerings[1].name,
            peering_name("skylift-test-gw-vnet", "skylift-test-vnet")
        );
        assert_ne!(peerings[0].source_network, peerings[1].source_network);
    }

    #[tokio::test]
    async fn links_every_zone_to_both_networks() {
        let plane = linked_plane().await;
        let links = plane.zone_links.lock().unwrap();

        assert_eq!(links.len(), PRIVATE_ZONES.len() * 2);
        for zone in PRIVATE_ZONES {
            assert_eq!(links.iter().filter(|l| l.zone == *zone).count(), 2);
        }
    }

    #[test]
    fn link_names_are_deterministic_and_distinct() {
        let a = link_name("privatelink.documents.azure.com", "/net/1");
        let b = link_name("privatelink.documents.azure.com", "/net/1");
        let c = link_name("privatelink.documents.azure.com", "/net/2");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("link-"));
    }
}
