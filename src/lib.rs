//! Registry Storage Operator
//!
//! A Kubernetes operator managing the storage backend configuration of a
//! deployed registry workload across Filesystem, S3, Azure, GCS, and Swift
//! backends.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Registry Controller                       │
//! │    (watch Registry resources, persist validated status)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      Driver Factory                          │
//! │        (select the driver for the active backend)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     Storage Drivers                          │
//! │  ┌────────────┐ ┌────┐ ┌───────┐ ┌─────┐ ┌───────┐          │
//! │  │ Filesystem │ │ S3 │ │ Azure │ │ GCS │ │ Swift │          │
//! │  └────────────┘ └────┘ └───────┘ └─────┘ └───────┘          │
//! ├─────────────────────────────────────────────────────────────┤
//! │                       State Store                            │
//! │   (facts pinned across reconciliations: backend, bucket,    │
//! │    container, volume-source kind)                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`crd`]: the Registry custom resource
//! - [`storage`]: storage drivers, driver factory, and the state store
//! - [`controller`]: the reconciliation loop
//! - [`error`]: error types and handling

pub mod controller;
pub mod crd;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use crd::{
    AzureStorage, ConditionStatus, FilesystemStorage, GcsStorage, ManagementState, Registry,
    RegistryCondition, RegistrySpec, RegistryStatus, S3Storage, StorageBackend, StorageSpec,
    StorageStatus, SwiftStorage, VolumeSource,
};

pub use error::{Error, ErrorAction, Result};

pub use storage::{
    plan,
    state::{StateStore, StateTransition},
    AzureDriver, DriverFactory, FilesystemDriver, GcsDriver, S3Driver, StorageDriver,
    StoragePlan, SwiftDriver,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
