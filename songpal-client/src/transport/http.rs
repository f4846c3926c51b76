//! One-shot HTTP POST transport.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use songpal_wire::{decode_incoming, Incoming, RequestEnvelope, WireError};

use crate::config::SessionConfig;
use crate::endpoint::Endpoint;
use crate::error::{ClientError, Result};
use crate::transport::{CallOutcome, Transport};

/// Plain HTTP transport: one POST per call, one JSON body back.
///
/// Also used during session bootstrap for the self-description fetch,
/// which always travels over HTTP (duplex capability is only knowable
/// from that document).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl HttpTransport {
    pub fn new(endpoint: Endpoint, config: &SessionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Transport {
                status: None,
                message: format!("unable to build HTTP client: {e}"),
            })?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// POST an envelope and return the raw body text.
    ///
    /// The response is read as text and parsed by shape downstream;
    /// devices are known to mislabel the Content-Type header, so it is
    /// deliberately never consulted.
    async fn post(&self, url: Url, request: &RequestEnvelope) -> Result<String> {
        trace!(%url, method = %request.method, id = request.id, "> POST");

        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(request.encode())
            .send()
            .await
            .map_err(|e| ClientError::Transport {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Transport {
                status: Some(status.as_u16()),
                message: format!("non-success response for {}", request.method),
            });
        }

        response.text().await.map_err(|e| ClientError::Transport {
            status: None,
            message: e.to_string(),
        })
    }

    /// POST an envelope and parse the body as a raw JSON value.
    ///
    /// The self-description exchanges answer under irregular keys
    /// (`results` for `getMethodTypes`), so bootstrap reads the body
    /// untyped instead of going through the envelope decoder.
    pub async fn fetch_json(&self, url: Url, request: &RequestEnvelope) -> Result<Value> {
        let body = self.post(url, request).await?;
        serde_json::from_str(&body).map_err(|e| {
            ClientError::Malformed(WireError::Malformed(format!("not valid JSON: {e}")))
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, service: &str, request: RequestEnvelope) -> Result<CallOutcome> {
        let url = self.endpoint.service_url(service);
        let request_id = request.id;
        let body = self.post(url, &request).await?;

        match decode_incoming(&body)? {
            Incoming::Result { id, result } => {
                if id != request_id {
                    // Cosmetic on HTTP: each call is its own exchange
                    debug!(expected = request_id, got = id, "response id mismatch");
                }
                Ok(CallOutcome::Result(result))
            }
            Incoming::Error { code, message, .. } => Ok(CallOutcome::Error { code, message }),
            Incoming::Notification { name, .. } => Err(ClientError::Malformed(
                WireError::Malformed(format!(
                    "notification {name} arrived as an HTTP response"
                )),
            )),
        }
    }
}
