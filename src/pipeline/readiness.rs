//! Bounded readiness polling.
//!
//! The one place in the system with genuine suspension: fixed-interval,
//! fixed-attempt sleep-then-retry, no backoff. Running out of attempts
//! is a hard failure, never a hang; an operator can also cancel between
//! attempts.

use reqwest::Client;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{ReadinessError, Result, SkyliftError};

use super::deployer::Releaser;

/// Interval between ingress-address probes.
const INGRESS_POLL_INTERVAL_SECS: u64 = 10;

/// Attempt budget for the ingress address.
const INGRESS_MAX_ATTEMPTS: u32 = 14;

/// Interval between interface-description probes.
const SPEC_POLL_INTERVAL_SECS: u64 = 20;

/// Attempt budget for the interface description.
const SPEC_MAX_ATTEMPTS: u32 = 20;

/// Path of the application's machine-readable interface description.
pub const INTERFACE_SPEC_PATH: &str = "/openapi.json";

/// Probe HTTP timeout in seconds.
const PROBE_TIMEOUT_SECS: u64 = 10;

/// Probe connection timeout in seconds.
const PROBE_CONNECT_TIMEOUT_SECS: u64 = 5;

/// A bounded sleep-then-retry poller.
#[derive(Debug, Clone)]
pub struct Poller {
    /// Sleep between attempts.
    interval: Duration,
    /// Attempt budget.
    max_attempts: u32,
    /// External cancellation signal, checked between attempts.
    cancel: Option<Arc<AtomicBool>>,
}

impl Poller {
    /// Creates a poller with the given interval and attempt budget.
    #[must_use]
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            cancel: None,
        }
    }

    /// Attaches an external cancellation flag.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Polls until the probe observes a value or the budget runs out.
    ///
    /// A probe returning `Ok(None)` means "signal not yet observed"; a
    /// probe error counts the same way (the condition is eventually
    /// consistent, observation failures are not provisioning failures).
    ///
    /// # Errors
    ///
    /// Returns a timeout error when the budget is exhausted, or a
    /// cancellation error when the external flag is raised.
    pub async fn poll_until<T, F, Fut>(&self, what: &str, mut probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        for attempt in 1..=self.max_attempts {
            if let Some(cancel) = &self.cancel
                && cancel.load(Ordering::Relaxed)
            {
                return Err(SkyliftError::Readiness(ReadinessError::Cancelled {
                    what: what.to_string(),
                }));
            }

            match probe().await {
                Ok(Some(value)) => {
                    info!("{what} observed after {attempt} attempt(s)");
                    return Ok(value);
                }
                Ok(None) => {
                    debug!("{what} not yet observed (attempt {attempt}/{})", self.max_attempts);
                }
                Err(e) => {
                    debug!("Probe for {what} failed (attempt {attempt}): {e}");
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        Err(SkyliftError::Readiness(ReadinessError::Timeout {
            what: what.to_string(),
            attempts: self.max_attempts,
        }))
    }
}

/// Unauthenticated HTTP probe for the interface-description endpoint.
#[derive(Debug, Clone)]
pub struct SpecProbe {
    /// HTTP client.
    client: Client,
}

impl SpecProbe {
    /// Creates a probe with bounded timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(PROBE_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                SkyliftError::internal(format!("Failed to create probe HTTP client: {e}"))
            })?;

        Ok(Self { client })
    }

    /// Probes the interface description once. `Ok(None)` means the
    /// endpoint is not answering successfully yet.
    ///
    /// # Errors
    ///
    /// Never fails on transport or status problems; those are "not yet".
    pub async fn fetch(&self, base_url: &str) -> Result<Option<serde_json::Value>> {
        let url = format!("{base_url}{INTERFACE_SPEC_PATH}");

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Probe request to {url} failed: {e}");
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            debug!("Probe to {url} answered {}", response.status());
            return Ok(None);
        }

        match response.json().await {
            Ok(document) => Ok(Some(document)),
            Err(e) => {
                debug!("Probe to {url} returned an unparsable body: {e}");
                Ok(None)
            }
        }
    }
}

/// Blocks the pipeline until the deployed application is reachable.
#[derive(Debug)]
pub struct ReadinessWaiter<'a, R: Releaser> {
    /// Cluster observation seam.
    releaser: &'a R,
    /// Interface-description probe.
    probe: SpecProbe,
    /// Poller for the ingress address.
    ingress_poller: Poller,
    /// Poller for the interface description.
    spec_poller: Poller,
}

impl<'a, R: Releaser> ReadinessWaiter<'a, R> {
    /// Creates a waiter with the documented poll budgets.
    ///
    /// # Errors
    ///
    /// Returns an error if the probe HTTP client cannot be created.
    pub fn new(releaser: &'a R) -> Result<Self> {
        Ok(Self {
            releaser,
            probe: SpecProbe::new()?,
            ingress_poller: Poller::new(
                Duration::from_secs(INGRESS_POLL_INTERVAL_SECS),
                INGRESS_MAX_ATTEMPTS,
            ),
            spec_poller: Poller::new(
                Duration::from_secs(SPEC_POLL_INTERVAL_SECS),
                SPEC_MAX_ATTEMPTS,
            ),
        })
    }

    /// Attaches an external cancellation flag to both pollers.
    #[must_use]
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.ingress_poller = self.ingress_poller.with_cancel(cancel.clone());
        self.spec_poller = self.spec_poller.with_cancel(cancel);
        self
    }

    /// Waits for the ingress to acquire an externally routable address.
    ///
    /// # Errors
    ///
    /// Returns a timeout error if the address never appears within the
    /// attempt budget.
    pub async fn await_ingress(&self, namespace: &str, service: &str) -> Result<String> {
        info!("Waiting for an ingress address on {namespace}/{service}");
        self.ingress_poller
            .poll_until("ingress address", || {
                self.releaser.ingress_address(namespace, service)
            })
            .await
    }

    /// Waits for the interface-description endpoint to answer.
    ///
    /// # Errors
    ///
    /// Returns a timeout error if the endpoint never answers within the
    /// attempt budget.
    pub async fn await_interface(&self, base_url: &str) -> Result<serde_json::Value> {
        info!("Waiting for the interface description at {base_url}{INTERFACE_SPEC_PATH}");
        self.spec_poller
            .poll_until("interface description", || self.probe.fetch(base_url))
            .await
    }
}
