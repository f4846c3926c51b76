//! Service registry: which methods exist, at which signature versions.
//!
//! Populated from the self-description at session start and replaced
//! wholesale on re-load. Resolution is read-only; the registry never talks
//! to the network.

use std::collections::HashMap;
use std::str::FromStr;

use serde_json::Value;
use tracing::debug;

use crate::description::ServiceBlock;
use crate::endpoint::ProtocolKind;
use crate::error::{ClientError, Result};

/// The parameter shape a signature declares for one positional slot.
///
/// Shapes arrive as strings: either a JSON object mapping field names to
/// type names (a trailing `*` marks an array of that object), or a bare
/// type name like `"string"`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamShape {
    /// Object shape with its declared field names
    Object { keys: Vec<String>, array: bool },
    /// Bare scalar type name
    Scalar(String),
}

impl ParamShape {
    fn parse(raw: &str) -> Self {
        let (body, array) = match raw.strip_suffix('*') {
            Some(stripped) => (stripped, true),
            None => (raw, false),
        };
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => ParamShape::Object {
                keys: map.keys().cloned().collect(),
                array,
            },
            _ => ParamShape::Scalar(raw.to_string()),
        }
    }
}

/// One versioned signature of a method.
#[derive(Debug, Clone)]
pub struct MethodSignature {
    pub service: String,
    pub name: String,
    pub version: String,
    /// Declared parameter shapes, one per positional wire parameter
    pub params: Vec<ParamShape>,
    /// Declared reply shapes (informational; replies are not validated)
    pub returns: Vec<String>,
}

/// A notification name a service can push, with its highest advertised
/// version.
#[derive(Debug, Clone)]
pub struct NotificationInfo {
    pub name: String,
    pub version: Option<String>,
}

#[derive(Debug, Default)]
struct ServiceEntry {
    protocols: Vec<String>,
    /// Signatures per method name, sorted highest version first
    methods: HashMap<String, Vec<MethodSignature>>,
    notifications: Vec<NotificationInfo>,
}

/// Registry of services, methods and signature versions for one device.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, ServiceEntry>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate from self-description blocks, replacing any prior state.
    pub fn load(&mut self, blocks: &[ServiceBlock]) {
        let mut services = HashMap::new();

        for block in blocks {
            let service_name = &block.description.service;
            let mut entry = ServiceEntry {
                protocols: block.description.protocols.clone(),
                ..Default::default()
            };

            for row in &block.signatures {
                let signature = MethodSignature {
                    service: service_name.clone(),
                    name: row.0.clone(),
                    version: row.3.clone(),
                    params: row.1.iter().map(|p| ParamShape::parse(p)).collect(),
                    returns: row.2.clone(),
                };
                let versions = entry.methods.entry(row.0.clone()).or_default();
                if versions.iter().any(|s| s.version == signature.version) {
                    debug!(
                        service = %service_name,
                        method = %signature.name,
                        version = %signature.version,
                        "duplicate signature version, keeping the first"
                    );
                    continue;
                }
                versions.push(signature);
            }

            for versions in entry.methods.values_mut() {
                versions.sort_by(|a, b| version_key(&b.version).cmp(&version_key(&a.version)));
            }

            entry.notifications = block
                .description
                .notifications
                .iter()
                .map(|n| NotificationInfo {
                    name: n.name.clone(),
                    version: n.latest_version().map(str::to_string),
                })
                .collect();

            services.insert(service_name.clone(), entry);
        }

        self.services = services;
    }

    /// Resolve a method signature.
    ///
    /// With no requested version, picks the numerically-highest version the
    /// device advertises. With one, requires an exact match.
    pub fn resolve(
        &self,
        service: &str,
        method: &str,
        requested_version: Option<&str>,
    ) -> Result<&MethodSignature> {
        let entry = self
            .services
            .get(service)
            .ok_or_else(|| ClientError::UnknownService(service.to_string()))?;

        let versions = entry
            .methods
            .get(method)
            .ok_or_else(|| ClientError::UnknownMethod {
                service: service.to_string(),
                method: method.to_string(),
            })?;

        match requested_version {
            None => versions.first().ok_or_else(|| ClientError::UnknownMethod {
                service: service.to_string(),
                method: method.to_string(),
            }),
            Some(requested) => versions
                .iter()
                .find(|s| s.version == requested)
                .ok_or_else(|| ClientError::UnsupportedVersion {
                    service: service.to_string(),
                    method: method.to_string(),
                    version: requested.to_string(),
                }),
        }
    }

    /// Names of all loaded services.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn has_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    /// Notification names a service declares.
    pub fn notifications(&self, service: &str) -> &[NotificationInfo] {
        self.services
            .get(service)
            .map(|e| e.notifications.as_slice())
            .unwrap_or(&[])
    }

    /// The service that declares a notification name, for attributing
    /// pushes arriving on the shared duplex connection.
    pub fn service_for_notification(&self, name: &str) -> Option<&str> {
        self.services.iter().find_map(|(service, entry)| {
            entry
                .notifications
                .iter()
                .any(|n| n.name == name)
                .then_some(service.as_str())
        })
    }

    /// Whether a service advertises the given transport protocol.
    pub fn service_supports(&self, service: &str, protocol: ProtocolKind) -> bool {
        self.services
            .get(service)
            .map(|e| {
                e.protocols
                    .iter()
                    .any(|p| ProtocolKind::from_str(p) == Ok(protocol))
            })
            .unwrap_or(false)
    }

    /// Whether any service advertises websocket support.
    pub fn any_websocket(&self) -> bool {
        self.services
            .keys()
            .any(|s| self.service_supports(s, ProtocolKind::WebSocket))
    }
}

/// Rank a "major.minor" version string numerically, so "1.10" > "1.9".
///
/// Lenient: segments that do not parse rank lowest rather than failing the
/// load; devices in the wild are inconsistent here.
fn version_key(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|segment| match segment.parse::<u64>() {
            Ok(n) => n,
            Err(_) => {
                debug!(%version, %segment, "unparseable version segment, ranking lowest");
                0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{ServiceDescription, SignatureRow};
    use proptest::prelude::*;
    use rstest::rstest;

    fn block(service: &str, rows: Vec<SignatureRow>) -> ServiceBlock {
        ServiceBlock {
            description: ServiceDescription {
                service: service.to_string(),
                protocols: vec!["xhrpost:jsonizer".to_string()],
                notifications: vec![],
            },
            signatures: rows,
        }
    }

    fn row(name: &str, version: &str) -> SignatureRow {
        SignatureRow(name.to_string(), vec![], vec![], version.to_string())
    }

    fn loaded(blocks: Vec<ServiceBlock>) -> ServiceRegistry {
        let mut registry = ServiceRegistry::new();
        registry.load(&blocks);
        registry
    }

    #[test]
    fn resolves_highest_version_by_default() {
        let registry = loaded(vec![block(
            "audio",
            vec![row("setVolume", "1.0"), row("setVolume", "1.1")],
        )]);

        let sig = registry.resolve("audio", "setVolume", None).unwrap();
        assert_eq!(sig.version, "1.1");
    }

    #[test]
    fn exact_version_match_and_unsupported_version() {
        let registry = loaded(vec![block(
            "audio",
            vec![row("setVolume", "1.0"), row("setVolume", "1.1")],
        )]);

        let sig = registry.resolve("audio", "setVolume", Some("1.0")).unwrap();
        assert_eq!(sig.version, "1.0");

        let err = registry
            .resolve("audio", "setVolume", Some("9.9"))
            .unwrap_err();
        assert!(matches!(err, ClientError::UnsupportedVersion { .. }));
    }

    #[test]
    fn unknown_service_and_method() {
        let registry = loaded(vec![block("audio", vec![row("setVolume", "1.0")])]);

        assert!(matches!(
            registry.resolve("video", "anything", None),
            Err(ClientError::UnknownService(_))
        ));
        assert!(matches!(
            registry.resolve("audio", "noSuchMethod", None),
            Err(ClientError::UnknownMethod { .. })
        ));
    }

    #[rstest]
    #[case(&["1.9", "1.10"], "1.10")]
    #[case(&["1.10", "1.9"], "1.10")]
    #[case(&["1.0", "2.0", "1.15"], "2.0")]
    #[case(&["1.0"], "1.0")]
    fn numeric_ordering_beats_lexical(#[case] versions: &[&str], #[case] expected: &str) {
        let rows = versions.iter().map(|v| row("m", v)).collect();
        let registry = loaded(vec![block("svc", rows)]);
        assert_eq!(registry.resolve("svc", "m", None).unwrap().version, expected);
    }

    #[test]
    fn duplicate_versions_keep_first_occurrence() {
        let registry = loaded(vec![block(
            "audio",
            vec![
                SignatureRow("m".into(), vec!["\"string\"".into()], vec![], "1.0".into()),
                SignatureRow("m".into(), vec![], vec![], "1.0".into()),
            ],
        )]);

        let sig = registry.resolve("audio", "m", Some("1.0")).unwrap();
        assert_eq!(sig.params.len(), 1);
    }

    #[test]
    fn reload_replaces_prior_state() {
        let mut registry = ServiceRegistry::new();
        registry.load(&[block("audio", vec![row("setVolume", "1.0")])]);
        registry.load(&[block("system", vec![row("getPowerStatus", "1.1")])]);

        assert!(!registry.has_service("audio"));
        assert!(registry.has_service("system"));
    }

    #[test]
    fn notification_attribution() {
        let blocks = vec![ServiceBlock {
            description: ServiceDescription {
                service: "audio".to_string(),
                protocols: vec!["websocket:jsonizer".to_string()],
                notifications: vec![serde_json::from_value(serde_json::json!({
                    "name": "notifyVolumeInformation",
                    "versions": [{"version": "1.0"}]
                }))
                .unwrap()],
            },
            signatures: vec![],
        }];
        let registry = loaded(blocks);

        assert_eq!(
            registry.service_for_notification("notifyVolumeInformation"),
            Some("audio")
        );
        assert_eq!(registry.service_for_notification("notifyNothing"), None);
        assert!(registry.service_supports("audio", ProtocolKind::WebSocket));
        assert!(registry.any_websocket());
    }

    #[test]
    fn object_param_shapes_are_parsed() {
        let registry = loaded(vec![block(
            "audio",
            vec![SignatureRow(
                "setAudioVolume".into(),
                vec!["{\"volume\":\"string\",\"output\":\"string\"}".into()],
                vec![],
                "1.1".into(),
            )],
        )]);

        let sig = registry.resolve("audio", "setAudioVolume", None).unwrap();
        match &sig.params[0] {
            ParamShape::Object { keys, array } => {
                assert!(keys.contains(&"volume".to_string()));
                assert!(keys.contains(&"output".to_string()));
                assert!(!array);
            }
            other => panic!("expected object shape, got {other:?}"),
        }
    }

    proptest! {
        /// Resolution with no explicit version always returns the
        /// numerically-highest advertised version.
        #[test]
        fn default_resolution_is_numeric_max(
            pairs in proptest::collection::hash_set((0u64..50, 0u64..50), 1..8)
        ) {
            let pairs: Vec<(u64, u64)> = pairs.into_iter().collect();
            let rows = pairs
                .iter()
                .map(|(major, minor)| row("m", &format!("{major}.{minor}")))
                .collect();
            let registry = loaded(vec![block("svc", rows)]);

            let expected = pairs.iter().max().unwrap();
            let resolved = registry.resolve("svc", "m", None).unwrap();
            prop_assert_eq!(&resolved.version, &format!("{}.{}", expected.0, expected.1));
        }
    }
}
