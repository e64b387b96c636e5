use std::sync::Arc;

use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::client::StatusClient;
use crate::config::Config;
use crate::endpoint::Endpoint;
use crate::error::Error;
use crate::metrics::{Accumulator, Measurement};
use crate::schema::{Resource, Schema};

/// One configured plugin instance.
///
/// `gather` fans out one task per base URL and returns once all of them
/// have finished. The HTTP client is created on the first gather and kept
/// for the lifetime of the instance.
pub struct AngieApi {
    config: Config,
    schema: &'static dyn Schema,
    client: OnceCell<StatusClient>,
}

impl AngieApi {
    pub fn new(config: Config) -> Self {
        let schema = config.api_version.schema();
        Self {
            config,
            schema,
            client: OnceCell::new(),
        }
    }

    /// Run one poll cycle, sending everything to `acc`.
    ///
    /// Only a failure to build the HTTP client fails the cycle itself;
    /// per-URL and per-resource failures go to `acc.add_error`.
    pub async fn gather(&self, acc: Arc<dyn Accumulator>) -> Result<(), Error> {
        let client = self
            .client
            .get_or_try_init(|| async { StatusClient::new(&self.config) })
            .await?
            .clone();

        let mut handles = Vec::with_capacity(self.config.urls.len());

        for raw in &self.config.urls {
            let endpoint = match Endpoint::parse(raw) {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    acc.add_error(err);
                    continue;
                }
            };

            let client = client.clone();
            let acc = acc.clone();
            let schema = self.schema;

            handles.push(tokio::spawn(async move {
                gather_endpoint(&client, schema, &endpoint, &*acc).await;
            }));
        }

        // Wait for every URL before the cycle counts as done
        for h in handles {
            if let Err(err) = h.await {
                warn!(%err, "gather task failed");
            }
        }

        Ok(())
    }
}

// ─── Per-URL pass ────────────────────────────────────────────────

/// Every sub-resource in turn; one failing never stops the others.
pub async fn gather_endpoint(
    client: &StatusClient,
    schema: &dyn Schema,
    endpoint: &Endpoint,
    acc: &dyn Accumulator,
) {
    for resource in Resource::ALL {
        match gather_resource(client, schema, endpoint, resource).await {
            Ok(measurements) => {
                for m in measurements.into_iter().filter(|m| !m.fields.is_empty()) {
                    acc.add_measurement(m);
                }
            }
            // This plugin polls a fixed list of paths that need not all be
            // configured on the server; a 404 just means "not enabled".
            Err(err) if err.is_not_found() => {
                debug!(%resource, base = %endpoint.base(), "resource not available");
            }
            Err(err) => acc.add_error(err),
        }
    }
}

async fn gather_resource(
    client: &StatusClient,
    schema: &dyn Schema,
    endpoint: &Endpoint,
    resource: Resource,
) -> Result<Vec<Measurement>, Error> {
    let body = client.fetch(endpoint, resource).await?;

    let document = schema.decode(resource, &body).map_err(|source| Error::Decode {
        url: endpoint
            .resource_url(resource.path())
            .map(|u| u.to_string())
            .unwrap_or_else(|_| resource.path().to_owned()),
        source,
    })?;

    // One timestamp for everything this resource pass produced
    let time = Utc::now();
    let mut measurements = document.flatten(&endpoint.tags());
    for m in &mut measurements {
        m.time = time;
    }
    Ok(measurements)
}
