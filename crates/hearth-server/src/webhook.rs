//! Outbound webhook pushes for trigger-category events.
//!
//! Only trigger events are pushed, never telemetry, so an automation system
//! receiving the hook cannot be fed back its own state updates. Delivery is
//! best-effort: non-2xx responses and transport errors are logged with the
//! event id and never retried here.

use crate::config::WebhookConfig;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Pushes JSON-serialized events to the configured endpoints.
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl WebhookNotifier {
    /// Builds a notifier from config. With no endpoints configured the
    /// notifier is inert and [`WebhookNotifier::notify`] is a no-op.
    pub fn from_config(config: &WebhookConfig) -> Self {
        let endpoints = [config.url.clone(), config.test_url.clone()]
            .into_iter()
            .flatten()
            .collect();

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();

        Self { client, endpoints }
    }

    /// Whether any endpoint is configured.
    pub fn is_configured(&self) -> bool {
        !self.endpoints.is_empty()
    }

    /// POSTs the body to every configured endpoint.
    ///
    /// `event_id` is logging context only. A timeout counts as a transport
    /// error: logged, not retried, never propagated.
    pub async fn notify<T: Serialize>(&self, event_id: Uuid, body: &T) {
        for endpoint in &self.endpoints {
            match self.client.post(endpoint).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        tracing::warn!(
                            %event_id,
                            endpoint = %endpoint,
                            status = %status,
                            "webhook endpoint returned non-success status"
                        );
                    } else {
                        tracing::debug!(%event_id, endpoint = %endpoint, "webhook delivered");
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        %event_id,
                        endpoint = %endpoint,
                        "webhook delivery failed: {}",
                        e
                    );
                }
            }
        }
    }
}
