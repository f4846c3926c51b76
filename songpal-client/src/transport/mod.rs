//! Request/response transports.
//!
//! Two implementations sit behind one contract: [`http::HttpTransport`]
//! performs one POST per call, [`duplex::DuplexTransport`] multiplexes
//! concurrent calls and unsolicited notifications over a persistent
//! websocket. The session decides per call which one carries a request.

pub mod duplex;
pub mod http;

use async_trait::async_trait;
use serde_json::Value;
use songpal_wire::RequestEnvelope;

use crate::error::Result;

/// What the device said about one call: a result payload, or an error
/// tuple to be classified by the invoker.
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    Result(Vec<Value>),
    Error { code: i64, message: String },
}

/// A way to deliver one request envelope and obtain the device's reply.
///
/// `service` selects the per-service URL on HTTP; the duplex transport
/// carries every service over its one connection and ignores it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, service: &str, request: RequestEnvelope) -> Result<CallOutcome>;
}
