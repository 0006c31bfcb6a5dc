//! Deployment notification sent once a final release is published.

use crate::error::{NotificationError, Result};
use crate::version::ReleaseTag;
use reqwest::Client;
use std::future::Future;

/// Tells a downstream service that a release is ready to deploy
pub trait DeploymentNotifier: Send + Sync {
    /// Announce `tag`
    fn notify(&self, tag: &ReleaseTag) -> impl Future<Output = Result<()>> + Send;
}

/// POSTs `{"<product>_version": "<tag>"}` with HTTP Basic auth
#[derive(Debug, Clone)]
pub struct HttpDeploymentNotifier {
    client: Client,
    endpoint: String,
    product: String,
    account_id: String,
    key: String,
}

impl HttpDeploymentNotifier {
    /// Create a notifier for `endpoint`
    pub fn new(
        endpoint: impl Into<String>,
        product: impl Into<String>,
        account_id: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            product: product.into(),
            account_id: account_id.into(),
            key: key.into(),
        }
    }

    /// Endpoint notifications are sent to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// JSON body announcing `tag`
    pub fn payload(&self, tag: &ReleaseTag) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert(
            format!("{}_version", self.product),
            serde_json::Value::String(tag.to_string()),
        );
        serde_json::Value::Object(body)
    }
}

impl DeploymentNotifier for HttpDeploymentNotifier {
    async fn notify(&self, tag: &ReleaseTag) -> Result<()> {
        log::info!("notifying {} of {}", self.endpoint, tag);

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.account_id, Some(&self.key))
            .json(&self.payload(tag))
            .send()
            .await
            .map_err(|e| NotificationError::Network {
                url: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        Ok(())
    }
}
