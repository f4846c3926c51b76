//! # SongPal SDK - typed control of SongPal capable audio devices
//!
//! Builds on the `songpal-client` protocol engine and adds typed views of
//! the everyday payloads:
//!
//! ```rust,ignore
//! use songpal_sdk::{Device, Endpoint};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), songpal_sdk::SdkError> {
//!     let device = Device::connect(Endpoint::from_env()?).await?;
//!
//!     let power = device.power().await?;
//!     println!("{power}");
//!
//!     for volume in device.volume_information().await? {
//!         println!("{volume}");
//!     }
//!
//!     device.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! songpal-sdk  (typed facade: Device, Power, Volume, ...)
//!     ↓
//! songpal-client  (registry, transports, notification hub, session)
//!     ↓
//! songpal-sdk-wire  (JSON envelope codec)
//! ```

pub use containers::{InterfaceInfo, Power, Sysinfo, Volume};
pub use device::Device;
pub use error::{Result, SdkError};

// Re-export the engine types callers need at this level
pub use songpal_client::{
    ClientError, Endpoint, Listener, NotificationEnvelope, SessionConfig, Subscription,
};

mod containers;
mod device;
mod error;
