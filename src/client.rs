use reqwest::blocking::Client;
use tracing::trace;

use crate::error::TransportError;
use crate::protocol::{FramePayload, InferenceResult};

/// Exchanges one frame for one inference result. Calls block until the
/// round-trip settles; the relay loop relies on that to keep at most one
/// request outstanding.
pub trait InferenceTransport {
    fn infer(&self, payload: &FramePayload) -> Result<InferenceResult, TransportError>;
}

/// JSON-over-HTTP transport for the inference endpoint.
///
/// Failed round-trips are not retried and no backoff is applied; recovery is
/// the loop's next tick. The request timeout is whatever the underlying
/// client defaults to.
pub struct HttpTransport {
    client: Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl InferenceTransport for HttpTransport {
    fn infer(&self, payload: &FramePayload) -> Result<InferenceResult, TransportError> {
        let response = self.client.post(&self.endpoint).json(payload).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        let body = response.text()?;
        trace!(bytes = body.len(), "inference response received");
        Ok(serde_json::from_str(&body)?)
    }
}
