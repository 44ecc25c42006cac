//! Registry CRD
//!
//! Defines the Registry resource: the desired state of a deployed registry
//! workload, including which storage backend it persists images to, and the
//! status the operator records against it.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{
    CSIVolumeSource, ConfigMapVolumeSource, EmptyDirVolumeSource, HostPathVolumeSource,
    NFSVolumeSource, PersistentVolumeClaimVolumeSource, SecretVolumeSource,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::state::StateStore;

// =============================================================================
// Registry CRD
// =============================================================================

/// Registry describes a registry workload whose storage backend is managed
/// by this operator. Exactly one backend section must be populated under
/// `spec.storage`.
#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "registry.billyronks.io",
    version = "v1",
    kind = "Registry",
    plural = "registries",
    shortname = "reg",
    status = "RegistryStatus",
    printcolumn = r#"{"name": "Backend", "type": "string", "jsonPath": ".status.storageState.storagetype"}"#,
    printcolumn = r#"{"name": "Managed", "type": "boolean", "jsonPath": ".status.storage.managed"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySpec {
    /// Whether the operator manages this resource
    #[serde(default)]
    pub management_state: ManagementState,

    /// Name of the secret holding the registry HTTP secret
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_secret: Option<String>,

    /// Proxy settings passed through to the workload
    #[serde(default)]
    pub proxy: ProxySpec,

    /// Desired storage backend
    #[serde(default)]
    pub storage: StorageSpec,

    /// Serve the registry over TLS
    #[serde(default)]
    pub tls: bool,

    /// ConfigMap holding additional trusted CA bundles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_config_name: Option<String>,

    /// Expose the registry through a default route
    #[serde(default)]
    pub default_route: bool,

    /// Additional user-defined routes
    #[serde(default)]
    pub routes: Vec<RouteSpec>,

    /// Number of registry replicas
    #[serde(default = "default_replicas")]
    pub replicas: i32,

    /// Registry log verbosity
    #[serde(default)]
    pub log_level: i64,
}

/// Whether the operator acts on the resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ManagementState {
    #[default]
    Managed,
    Unmanaged,
    Removed,
}

impl std::fmt::Display for ManagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagementState::Managed => write!(f, "Managed"),
            ManagementState::Unmanaged => write!(f, "Unmanaged"),
            ManagementState::Removed => write!(f, "Removed"),
        }
    }
}

/// Proxy settings for the registry workload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProxySpec {
    #[serde(default)]
    pub http: String,
    #[serde(default)]
    pub https: String,
    #[serde(default)]
    pub no_proxy: String,
}

/// A user-defined route to the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    pub name: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub secret_name: String,
}

// =============================================================================
// Storage Configuration
// =============================================================================

/// Desired storage backend. At most one section may be populated; an empty
/// struct means no backend has been selected yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<FilesystemStorage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Storage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureStorage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcs: Option<GcsStorage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swift: Option<SwiftStorage>,
}

/// Local volume backend: registry data lives on a user-supplied volume
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FilesystemStorage {
    #[serde(default)]
    pub volume_source: VolumeSource,
}

/// AWS S3 (or S3-compatible) bucket backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct S3Storage {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub region_endpoint: String,
    #[serde(default)]
    pub encrypt: bool,
}

/// Azure Blob Storage container backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureStorage {
    #[serde(default)]
    pub container: String,
}

/// Google Cloud Storage bucket backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GcsStorage {
    #[serde(default)]
    pub bucket: String,
}

/// OpenStack Swift container backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SwiftStorage {
    #[serde(default, rename = "authURL")]
    pub auth_url: String,
    #[serde(default)]
    pub container: String,
}

/// Volume source for the filesystem backend. Mirrors the core/v1 volume
/// source layout for the mount mechanisms the registry supports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VolumeSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_dir: Option<EmptyDirVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_path: Option<HostPathVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nfs: Option<NFSVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretVolumeSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csi: Option<CSIVolumeSource>,
}

/// The active backend variant, resolved from [`StorageSpec`]. Carries the
/// configuration of exactly one backend.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    Filesystem(FilesystemStorage),
    S3(S3Storage),
    Azure(AzureStorage),
    Gcs(GcsStorage),
    Swift(SwiftStorage),
}

impl StorageBackend {
    /// Stable backend identifier
    pub fn name(&self) -> &'static str {
        match self {
            StorageBackend::Filesystem(_) => "filesystem",
            StorageBackend::S3(_) => "s3",
            StorageBackend::Azure(_) => "azure",
            StorageBackend::Gcs(_) => "gcs",
            StorageBackend::Swift(_) => "swift",
        }
    }
}

impl StorageSpec {
    /// Resolve the active backend variant.
    ///
    /// Fails when no section is populated or when more than one is, so
    /// everything downstream of this call operates on a single backend.
    pub fn backend(&self) -> Result<StorageBackend> {
        let mut found = Vec::new();

        if let Some(c) = &self.filesystem {
            found.push(StorageBackend::Filesystem(c.clone()));
        }
        if let Some(c) = &self.s3 {
            found.push(StorageBackend::S3(c.clone()));
        }
        if let Some(c) = &self.azure {
            found.push(StorageBackend::Azure(c.clone()));
        }
        if let Some(c) = &self.gcs {
            found.push(StorageBackend::Gcs(c.clone()));
        }
        if let Some(c) = &self.swift {
            found.push(StorageBackend::Swift(c.clone()));
        }

        if found.len() > 1 {
            return Err(Error::AmbiguousBackendConfigured {
                backends: found.iter().map(StorageBackend::name).collect(),
            });
        }

        found.into_iter().next().ok_or(Error::NoBackendConfigured)
    }

    /// Check whether any backend section is populated
    pub fn is_set(&self) -> bool {
        self.filesystem.is_some()
            || self.s3.is_some()
            || self.azure.is_some()
            || self.gcs.is_some()
            || self.swift.is_some()
    }
}

// =============================================================================
// Status
// =============================================================================

/// Condition type: the storage medium exists
pub const STORAGE_EXISTS: &str = "StorageExists";

/// Condition type: the storage medium we created was tagged correctly
pub const STORAGE_TAGGED: &str = "StorageTagged";

/// Condition type: the storage medium we created has encryption enabled
pub const STORAGE_ENCRYPTED: &str = "StorageEncrypted";

/// Condition type: the storage medium cleans up incomplete uploads
pub const STORAGE_INCOMPLETE_UPLOAD_CLEANUP_ENABLED: &str =
    "StorageIncompleteUploadCleanupEnabled";

/// Status of the Registry resource
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatus {
    /// Conditions
    #[serde(default)]
    pub conditions: Vec<RegistryCondition>,

    /// Committed storage configuration
    #[serde(default)]
    pub storage: StorageStatus,

    /// Facts recorded by storage drivers across reconciliations
    #[serde(default)]
    pub storage_state: StateStore,
}

/// Storage configuration the operator has committed to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    /// Whether the operator created the storage medium (as opposed to the
    /// user supplying a pre-existing one)
    #[serde(default)]
    pub managed: bool,

    /// The storage configuration that was actually committed, independent
    /// of the live spec
    #[serde(default)]
    pub state: StorageSpec,
}

/// Condition for the Registry status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistryCondition {
    /// Type of condition
    pub r#type: String,
    /// Status: True, False, Unknown
    pub status: ConditionStatus,
    /// Last transition time
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_transition_time: Option<DateTime<Utc>>,
    /// Machine-readable reason
    #[serde(default)]
    pub reason: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
}

/// Condition status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl RegistryCondition {
    /// Build a condition stamped with the current time
    pub fn new(
        r#type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            r#type: r#type.into(),
            status,
            last_transition_time: Some(Utc::now()),
            reason: Some(reason.into()),
            message: Some(message.into()),
        }
    }
}

impl RegistryStatus {
    /// Set a condition, replacing an existing one of the same type.
    ///
    /// Returns whether the condition set materially changed; an update that
    /// only refreshes the transition time is dropped so repeated
    /// reconciliations do not rewrite the status.
    pub fn set_condition(&mut self, condition: RegistryCondition) -> bool {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            Some(existing)
                if existing.status == condition.status
                    && existing.reason == condition.reason
                    && existing.message == condition.message =>
            {
                false
            }
            Some(existing) => {
                *existing = condition;
                true
            }
            None => {
                self.conditions.push(condition);
                true
            }
        }
    }

    /// Look up a condition by type
    pub fn condition(&self, r#type: &str) -> Option<&RegistryCondition> {
        self.conditions.iter().find(|c| c.r#type == r#type)
    }
}

// =============================================================================
// Default Value Functions
// =============================================================================

fn default_replicas() -> i32 {
    1
}

// =============================================================================
// Implementations
// =============================================================================

impl Registry {
    /// Get the name of this registry
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_backend_requires_exactly_one_section() {
        let empty = StorageSpec::default();
        assert_matches!(empty.backend(), Err(Error::NoBackendConfigured));
        assert!(!empty.is_set());

        let spec = StorageSpec {
            gcs: Some(GcsStorage {
                bucket: "images".into(),
            }),
            ..Default::default()
        };
        let backend = spec.backend().unwrap();
        assert_eq!(backend.name(), "gcs");
    }

    #[test]
    fn test_backend_rejects_multiple_sections() {
        let spec = StorageSpec {
            s3: Some(S3Storage::default()),
            swift: Some(SwiftStorage::default()),
            ..Default::default()
        };
        assert_matches!(
            spec.backend(),
            Err(Error::AmbiguousBackendConfigured { backends }) if backends == vec!["s3", "swift"]
        );
    }

    #[test]
    fn test_storage_spec_wire_shape() {
        let spec = StorageSpec {
            s3: Some(S3Storage {
                bucket: "images".into(),
                region: "us-east-1".into(),
                region_endpoint: "http://minio:9000".into(),
                encrypt: true,
            }),
            ..Default::default()
        };
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["s3"]["bucket"], "images");
        assert_eq!(value["s3"]["regionEndpoint"], "http://minio:9000");
        assert!(value.get("filesystem").is_none());

        let swift = StorageSpec {
            swift: Some(SwiftStorage {
                auth_url: "https://keystone:5000/v3".into(),
                container: "images".into(),
            }),
            ..Default::default()
        };
        let value = serde_json::to_value(&swift).unwrap();
        assert_eq!(value["swift"]["authURL"], "https://keystone:5000/v3");
    }

    #[test]
    fn test_set_condition_replaces_same_type() {
        let mut status = RegistryStatus::default();

        let changed = status.set_condition(RegistryCondition::new(
            STORAGE_EXISTS,
            ConditionStatus::Unknown,
            "AwaitingProvisioning",
            "storage medium has not been provisioned",
        ));
        assert!(changed);
        assert_eq!(status.conditions.len(), 1);

        // Same content again is not a change
        let changed = status.set_condition(RegistryCondition::new(
            STORAGE_EXISTS,
            ConditionStatus::Unknown,
            "AwaitingProvisioning",
            "storage medium has not been provisioned",
        ));
        assert!(!changed);
        assert_eq!(status.conditions.len(), 1);

        let changed = status.set_condition(RegistryCondition::new(
            STORAGE_EXISTS,
            ConditionStatus::True,
            "StorageProvisioned",
            "storage medium exists",
        ));
        assert!(changed);
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(
            status.condition(STORAGE_EXISTS).unwrap().status,
            ConditionStatus::True
        );
    }

    #[test]
    fn test_management_state_defaults_to_managed() {
        let spec: RegistrySpec = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(spec.management_state, ManagementState::Managed);
        assert_eq!(spec.replicas, 1);
        assert!(!spec.storage.is_set());
    }
}
