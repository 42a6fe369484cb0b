use std::{
    sync::{Arc, OnceLock},
    time::Duration,
};

use tokio::sync::OnceCell;
use url::Url;

/// Liveness probe for the Vite dev server.
///
/// One HEAD request against the internal dev-server URL decides the answer
/// for the probe's whole lifetime: the result is cached, so however many
/// registrations ask, the request runs at most once per scope. Clones share
/// the cache.
#[derive(Clone, Debug)]
pub struct DevServerProbe {
    url: Url,
    client: Arc<OnceLock<reqwest::Client>>,
    cached: Arc<OnceCell<bool>>,
    options: ProbeOptions,
}

impl DevServerProbe {
    pub fn new(url: Url) -> Self {
        Self::with_options(url, ProbeOptions::default())
    }

    pub fn with_options(url: Url, options: ProbeOptions) -> Self {
        Self {
            url,
            client: Arc::new(OnceLock::new()),
            cached: Arc::new(OnceCell::new()),
            options,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Whether the dev server answered the probe. `200` and `404` both count
    /// as up: the port is listening and speaking HTTP, whether the probed
    /// route exists is irrelevant. Any transport failure counts as down.
    pub async fn is_running(&self) -> bool {
        *self.cached.get_or_init(|| self.ping()).await
    }

    async fn ping(&self) -> bool {
        tracing::debug!(url = %self.url, "pinging dev server");

        let client = match self.client() {
            Ok(client) => client,
            Err(err) => {
                tracing::debug!(error = %err, "failed to build probe client");
                return false;
            }
        };

        match client.head(self.url.clone()).send().await {
            Ok(res) if matches!(res.status().as_u16(), 200 | 404) => {
                tracing::debug!("dev server is running");
                true
            }
            Ok(res) => {
                tracing::debug!(status = %res.status(), "dev server answered with unexpected status");
                false
            }
            Err(err) => {
                tracing::debug!(error = %err, "dev server not found");
                false
            }
        }
    }

    fn client(&self) -> Result<&reqwest::Client, reqwest::Error> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::Client::builder()
            .connect_timeout(self.options.connect_timeout)
            .timeout(self.options.request_timeout)
            .build()?;
        Ok(self.client.get_or_init(|| client))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ProbeOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(3),
        }
    }
}
