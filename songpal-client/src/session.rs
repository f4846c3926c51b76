//! Device session: bootstrap, method invocation, subscription lifecycle.
//!
//! A session owns everything tied to one device: the HTTP transport (always
//! present, it carries the self-description fetch), the optional duplex
//! websocket, the capability registry and the notification hub. Sessions
//! are fully independent of each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tracing::{debug, warn};

use songpal_wire::{DeviceErrorCode, ErrorClass, RequestEnvelope};

use crate::config::SessionConfig;
use crate::description::{parse_method_types, parse_supported_api, ServiceBlock};
use crate::endpoint::{Endpoint, ProtocolKind};
use crate::error::{ClientError, Result};
use crate::notification::{Listener, NotificationHub, Subscription};
use crate::registry::{NotificationInfo, ParamShape, ServiceRegistry};
use crate::transport::duplex::DuplexTransport;
use crate::transport::http::HttpTransport;
use crate::transport::{CallOutcome, Transport};

/// Version used for the bootstrap calls that run before any signature is
/// known.
const BASELINE_VERSION: &str = "1.0";

/// A live session against one device.
pub struct DeviceSession {
    endpoint: Endpoint,
    config: SessionConfig,
    http: HttpTransport,
    registry: Arc<RwLock<ServiceRegistry>>,
    hub: Arc<NotificationHub>,
    duplex: Mutex<Option<Arc<DuplexTransport>>>,
    /// Request ids are unique and strictly increasing per session
    idgen: AtomicU64,
}

impl DeviceSession {
    /// Connect to a device: fetch its self-description over HTTP, load the
    /// registry, and open the duplex transport when the device advertises
    /// websocket support and the configuration does not force HTTP.
    pub async fn connect(endpoint: Endpoint, config: SessionConfig) -> Result<Self> {
        let http = HttpTransport::new(endpoint.clone(), &config)?;
        let session = Self {
            endpoint,
            config,
            http,
            registry: Arc::new(RwLock::new(ServiceRegistry::new())),
            hub: Arc::new(NotificationHub::new()),
            duplex: Mutex::new(None),
            idgen: AtomicU64::new(0),
        };

        let blocks = session.fetch_description().await?;
        session.registry.write().load(&blocks);

        let open_duplex = match session.config.force_protocol {
            Some(ProtocolKind::XhrPost) => false,
            Some(ProtocolKind::WebSocket) => true,
            None => session.registry.read().any_websocket(),
        };
        if open_duplex {
            let duplex = DuplexTransport::connect(
                session.endpoint.websocket_url(),
                Arc::clone(&session.hub),
                Arc::clone(&session.registry),
                &session.config,
            )
            .await?;
            *session.duplex.lock() = Some(Arc::new(duplex));
        }

        Ok(session)
    }

    /// Invoke a named method on a service.
    ///
    /// `params` becomes the single positional wire parameter (`None` sends
    /// an empty parameter list; many methods treat that as a wildcard).
    /// Without an explicit `version` the highest advertised one is used.
    ///
    /// The result is shaped the way the protocol means it: a one-element
    /// result list yields that element, an empty list yields null, a
    /// longer list is returned whole.
    pub async fn invoke(
        &self,
        service: &str,
        method: &str,
        params: Option<Value>,
        version: Option<&str>,
    ) -> Result<Value> {
        let (resolved_version, shapes) = {
            let registry = self.registry.read();
            let signature = registry.resolve(service, method, version)?;
            (signature.version.clone(), signature.params.clone())
        };
        validate_params(method, &shapes, params.as_ref())?;

        let wire_params = match params {
            Some(value) => vec![value],
            None => vec![],
        };
        let request = RequestEnvelope::new(self.next_id(), method, wire_params, resolved_version);

        match self.dispatch(service, request).await? {
            CallOutcome::Result(result) => Ok(shape_result(method, result)),
            CallOutcome::Error { code, message } => Err(classify_device_error(code, message)),
        }
    }

    /// Register a listener for a service's notifications; `None` listens
    /// to everything the service pushes.
    ///
    /// Requires the duplex transport: notifications only travel on the
    /// persistent connection.
    pub fn subscribe(
        &self,
        service: &str,
        name: Option<&str>,
        listener: Listener,
    ) -> Result<Subscription> {
        if !self.registry.read().has_service(service) {
            return Err(ClientError::UnknownService(service.to_string()));
        }
        let duplex = self.duplex.lock().clone();
        match duplex {
            Some(d) if d.is_open() => Ok(self.hub.subscribe(service, name, listener)),
            _ => Err(ClientError::DuplexUnavailable),
        }
    }

    /// Cancel one subscription. Unknown handles are ignored.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.hub.unsubscribe(subscription);
    }

    /// Replace the handler receiving notifications nobody subscribed to.
    pub fn set_fallback_handler(&self, listener: Listener) {
        self.hub.set_fallback(listener);
    }

    /// Close the session. Tears down the duplex transport when open,
    /// failing its pending calls and clearing subscriptions. Idempotent.
    pub fn close(&self) {
        if let Some(duplex) = self.duplex.lock().take() {
            duplex.close();
        }
    }

    /// Re-fetch the self-description and replace the registry contents.
    pub async fn refresh_description(&self) -> Result<()> {
        let blocks = self.fetch_description().await?;
        self.registry.write().load(&blocks);
        Ok(())
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Names of the services the device advertises.
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .registry
            .read()
            .service_names()
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    /// Notification names a service declares.
    pub fn notifications(&self, service: &str) -> Vec<NotificationInfo> {
        self.registry.read().notifications(service).to_vec()
    }

    pub fn is_duplex_active(&self) -> bool {
        self.duplex
            .lock()
            .as_ref()
            .map(|d| d.is_open())
            .unwrap_or(false)
    }

    fn next_id(&self) -> u64 {
        self.idgen.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Two-step self-description fetch, always over HTTP: the service list
    /// from the guide URL, then each service's signatures. A service that
    /// answers with an error or advertises no known protocol is skipped
    /// with a warning rather than failing the whole bootstrap.
    async fn fetch_description(&self) -> Result<Vec<ServiceBlock>> {
        let request = RequestEnvelope::new(
            self.next_id(),
            "getSupportedApiInfo",
            vec![json!({})],
            BASELINE_VERSION,
        );
        let body = self.http.fetch_json(self.endpoint.guide_url(), &request).await?;
        let services = parse_supported_api(&body)?;
        debug!(count = services.len(), "device advertises services");

        let mut blocks = Vec::new();
        for description in services {
            let known_protocol = description
                .protocols
                .iter()
                .any(|p| p.parse::<ProtocolKind>().is_ok());
            if !known_protocol {
                warn!(
                    service = %description.service,
                    protocols = ?description.protocols,
                    "service advertises no known protocol, skipping"
                );
                continue;
            }

            let request = RequestEnvelope::new(
                self.next_id(),
                "getMethodTypes",
                vec![json!("")],
                BASELINE_VERSION,
            );
            let url = self.endpoint.service_url(&description.service);
            match self.http.fetch_json(url, &request).await {
                Ok(body) => match parse_method_types(&body) {
                    Ok(signatures) => blocks.push(ServiceBlock {
                        description,
                        signatures,
                    }),
                    Err(e) => warn!(
                        service = %description.service,
                        error = %e,
                        "unreadable method signatures, skipping service"
                    ),
                },
                Err(e) => warn!(
                    service = %description.service,
                    error = %e,
                    "unable to fetch method signatures, skipping service"
                ),
            }
        }
        Ok(blocks)
    }

    /// Pick the wire for one call: the duplex connection when it is open
    /// and the service advertises websocket support, plain HTTP otherwise.
    async fn dispatch(&self, service: &str, request: RequestEnvelope) -> Result<CallOutcome> {
        let duplex = self.duplex.lock().clone();
        if let Some(duplex) = duplex {
            let use_duplex = duplex.is_open()
                && self
                    .registry
                    .read()
                    .service_supports(service, ProtocolKind::WebSocket);
            if use_duplex {
                return duplex.call(request).await;
            }
        }
        Transport::call(&self.http, service, request).await
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("endpoint", &self.endpoint)
            .field("duplex_active", &self.is_duplex_active())
            .finish()
    }
}

/// Check the caller's argument against the resolved signature shape.
///
/// An omitted parameter is always allowed (devices treat the empty list as
/// a wildcard); a parameter passed to a method that declares none, or an
/// object carrying a field the signature does not declare, is a mismatch.
fn validate_params(method: &str, shapes: &[ParamShape], arg: Option<&Value>) -> Result<()> {
    let Some(arg) = arg else {
        return Ok(());
    };

    let mismatch = |reason: String| ClientError::ArgumentMismatch {
        method: method.to_string(),
        reason,
    };

    let Some(shape) = shapes.first() else {
        return Err(mismatch("method takes no parameters".to_string()));
    };

    match shape {
        ParamShape::Object { keys, array } => {
            let objects: Vec<&serde_json::Map<String, Value>> = match arg {
                Value::Object(map) => vec![map],
                Value::Array(items) if *array => {
                    items.iter().filter_map(Value::as_object).collect()
                }
                _ => return Err(mismatch("expected an object parameter".to_string())),
            };
            for map in objects {
                if let Some(unknown) = map.keys().find(|k| !keys.contains(*k)) {
                    return Err(mismatch(format!("unknown parameter {unknown}")));
                }
            }
        }
        // Scalar shapes are duck-typed; the device validates the value
        ParamShape::Scalar(_) => {}
    }
    Ok(())
}

/// Collapse a wire result list the way the protocol means it.
fn shape_result(method: &str, mut result: Vec<Value>) -> Value {
    match result.len() {
        0 => Value::Null,
        1 => result.remove(0),
        _ => {
            warn!(%method, parts = result.len(), "multi-part result, returning whole list");
            Value::Array(result)
        }
    }
}

/// Translate a device-reported error tuple into the caller-facing
/// taxonomy. The engine never retries; the variant tells the caller
/// whether a retry can help.
fn classify_device_error(code: i64, message: String) -> ClientError {
    match DeviceErrorCode::from_code(code).class() {
        ErrorClass::InvalidRequest => ClientError::InvalidRequest { code, message },
        ErrorClass::Transient => ClientError::RetryableDevice { code, message },
        ErrorClass::Other => ClientError::Device { code, message },
    }
}
