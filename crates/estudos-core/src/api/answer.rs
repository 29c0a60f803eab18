use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{join_url, truncate_body, AnswerService, Endpoints};
use crate::error::ChatError;
use crate::state::ChatRequest;

#[derive(Serialize, Debug, PartialEq)]
struct ChatBody<'a> {
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    folder_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: Option<String>,
}

/// HTTP client for the chat endpoints of the study backend
#[derive(Clone)]
pub struct AnswerClient {
    client: Client,
    base_url: String,
    endpoints: Endpoints,
}

impl AnswerClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url, Endpoints::default())
    }

    /// Share a configured `reqwest::Client` (timeouts, connection pool)
    pub fn with_client(client: Client, base_url: &str, endpoints: Endpoints) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            endpoints,
        }
    }

    /// Pick the endpoint and JSON body for a request
    fn route<'a>(&self, request: &'a ChatRequest) -> (String, ChatBody<'a>) {
        let path = if request.is_contextual() {
            &self.endpoints.chat_contextual
        } else {
            &self.endpoints.chat
        };

        let body = ChatBody {
            message: &request.text,
            folder_id: request.context_id.as_deref(),
        };

        (join_url(&self.base_url, path), body)
    }
}

#[async_trait]
impl AnswerService for AnswerClient {
    async fn ask(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let (url, body) = self.route(request);

        debug!(%url, contextual = request.is_contextual(), "chat request");

        let response = self
            .client
            .post(&url)
            .json(&body)
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

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Parse(e.to_string()))?;

        Ok(chat_response.response.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_general_request_uses_default_endpoint() {
        let client = AnswerClient::new("http://localhost:5000");
        let request = ChatRequest::new("X", Some("general"));
        let (url, body) = client.route(&request);

        assert_eq!(url, "http://localhost:5000/api/chat");
        assert_eq!(serde_json::to_value(&body).unwrap(), serde_json::json!({"message": "X"}));
    }

    #[test]
    fn test_contextual_request_carries_folder_id() {
        let client = AnswerClient::new("http://localhost:5000");
        let request = ChatRequest::new("X", Some("f123"));
        let (url, body) = client.route(&request);

        assert_eq!(url, "http://localhost:5000/api/chat_contextual");
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"message": "X", "folder_id": "f123"})
        );
    }

    #[test]
    fn test_custom_endpoints() {
        let endpoints = Endpoints {
            chat: "/v2/ask".to_string(),
            ..Endpoints::default()
        };
        let client = AnswerClient::with_client(Client::new(), "http://study.local/", endpoints);
        let (url, _) = client.route(&ChatRequest::new("X", None));
        assert_eq!(url, "http://study.local/v2/ask");
    }

    #[test]
    fn test_missing_response_field_is_empty_answer() {
        let parsed: ChatResponse = serde_json::from_str(r#"{"error": "nope"}"#).unwrap();
        assert_eq!(parsed.response.unwrap_or_default(), "");

        let parsed: ChatResponse = serde_json::from_str(r#"{"response": null}"#).unwrap();
        assert!(parsed.response.is_none());
    }
}
