use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{join_url, truncate_body, ContextRegistry, Endpoints};
use crate::error::ChatError;
use crate::state::ContextOption;

#[derive(Deserialize)]
struct ContextsResponse {
    #[serde(default)]
    contexts: Option<Vec<ContextOption>>,
}

/// HTTP client for the list of contexts (folders) a user can ask about
#[derive(Clone)]
pub struct ContextClient {
    client: Client,
    base_url: String,
    endpoints: Endpoints,
}

impl ContextClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url, Endpoints::default())
    }

    pub fn with_client(client: Client, base_url: &str, endpoints: Endpoints) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            endpoints,
        }
    }
}

#[async_trait]
impl ContextRegistry for ContextClient {
    async fn list(&self) -> Result<Vec<ContextOption>, ChatError> {
        let url = join_url(&self.base_url, &self.endpoints.contexts);

        debug!(%url, "listing contexts");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ChatError::Status {
                status: status.as_u16(),
                body: truncate_body(&text),
            });
        }

        let contexts_response: ContextsResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Parse(e.to_string()))?;

        Ok(contexts_response.contexts.unwrap_or_default())
    }
}
