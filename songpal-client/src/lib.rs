//! Protocol client engine for SongPal capable audio devices
//!
//! The engine bootstraps from a device endpoint, learns the device's
//! capabilities from its self-description, and exposes every advertised
//! method as an opaque named remote call with versioned signatures.
//! Calls travel over plain HTTP POST or over one persistent websocket,
//! chosen per call from the device's declared capabilities; asynchronous
//! push notifications arrive on the websocket and are fanned out to
//! registered listeners without disturbing in-flight calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use songpal_client::{DeviceSession, Endpoint, SessionConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), songpal_client::ClientError> {
//!     let endpoint = Endpoint::new("http://192.168.1.50:10000/sony")?;
//!     let session = DeviceSession::connect(endpoint, SessionConfig::default()).await?;
//!
//!     let power = session
//!         .invoke("system", "getPowerStatus", None, None)
//!         .await?;
//!     println!("power: {power}");
//!
//!     let sub = session.subscribe(
//!         "audio",
//!         Some("notifyVolumeInformation"),
//!         Arc::new(|n| println!("volume changed: {:?}", n.payload)),
//!     )?;
//!
//!     // ... later
//!     session.unsubscribe(&sub);
//!     session.close();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod description;
pub mod endpoint;
pub mod error;
pub mod notification;
pub mod registry;
pub mod session;
pub mod transport;

pub use config::SessionConfig;
pub use endpoint::{Endpoint, ProtocolKind, ENDPOINT_ENV_VAR};
pub use error::{ClientError, Result};
pub use notification::{Listener, NotificationEnvelope, NotificationHub, Subscription};
pub use registry::{MethodSignature, NotificationInfo, ServiceRegistry};
pub use session::DeviceSession;
pub use transport::duplex::ConnectionState;

// Re-export the wire layer for callers that work with raw envelopes
pub use songpal_wire::{DeviceErrorCode, ErrorClass, RequestEnvelope, WireError};
