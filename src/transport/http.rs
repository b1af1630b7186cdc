//! HTTP transport speaking the service's data stream protocol

use super::{data_stream, FragmentStream, TransportError};
use crate::config::SessionConfig;
use crate::runtime::Transport;
use crate::state_machine::RequestOptions;
use crate::store::Message;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokeRequest<'a> {
    messages: Vec<WireMessage<'a>>,
    #[serde(flatten)]
    options: &'a RequestOptions,
}

/// POSTs the transcript to `{base_url}/invoke` and decodes the streamed reply
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &SessionConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn open(
        &self,
        history: &[Message],
        options: &RequestOptions,
    ) -> Result<FragmentStream, TransportError> {
        let body = InvokeRequest {
            messages: history
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            options,
        };

        tracing::debug!(
            endpoint = %self.endpoint,
            messages = body.messages.len(),
            effort_level = %options.effort_level,
            "Opening response stream"
        );

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(TransportError::from_status(status, &text));
        }

        if response.headers().get("x-vercel-ai-data-stream").is_none() {
            tracing::debug!("Response is missing the data stream header, decoding anyway");
        }

        Ok(data_stream::fragment_stream(Box::pin(response.bytes_stream())))
    }
}
