//! Volume-source field resolution
//!
//! The filesystem backend records which mount mechanism the user selected
//! as an immutable fact, and builds the workload volume carrying that
//! mechanism. Both need to know which field of the volume source is
//! populated.

use k8s_openapi::api::core::v1::Volume;

use crate::crd::VolumeSource;
use crate::error::{Error, Result};

/// Resolve which volume-source mechanism is populated.
///
/// Returns the canonical kind name (`"EmptyDir"`, `"HostPath"`, ...) of the
/// single populated field, `None` when nothing is populated, and an error
/// when several are, since the selected mechanism cannot be determined.
pub fn volume_source_kind(source: &VolumeSource) -> Result<Option<&'static str>> {
    let mut populated = Vec::new();

    if source.empty_dir.is_some() {
        populated.push("EmptyDir");
    }
    if source.host_path.is_some() {
        populated.push("HostPath");
    }
    if source.persistent_volume_claim.is_some() {
        populated.push("PersistentVolumeClaim");
    }
    if source.nfs.is_some() {
        populated.push("NFS");
    }
    if source.config_map.is_some() {
        populated.push("ConfigMap");
    }
    if source.secret.is_some() {
        populated.push("Secret");
    }
    if source.csi.is_some() {
        populated.push("CSI");
    }

    match populated.len() {
        0 => Ok(None),
        1 => Ok(populated.pop()),
        _ => Err(Error::VolumeSourceUnresolvable { populated }),
    }
}

/// Build the workload volume carrying the selected source.
pub fn volume_with_source(name: &str, source: &VolumeSource) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: source.empty_dir.clone(),
        host_path: source.host_path.clone(),
        persistent_volume_claim: source.persistent_volume_claim.clone(),
        nfs: source.nfs.clone(),
        config_map: source.config_map.clone(),
        secret: source.secret.clone(),
        csi: source.csi.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use k8s_openapi::api::core::v1::{EmptyDirVolumeSource, HostPathVolumeSource};

    fn empty_dir_source() -> VolumeSource {
        VolumeSource {
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolves_single_populated_field() {
        assert_eq!(
            volume_source_kind(&empty_dir_source()).unwrap(),
            Some("EmptyDir")
        );

        let host_path = VolumeSource {
            host_path: Some(HostPathVolumeSource {
                path: "/var/lib/registry".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(volume_source_kind(&host_path).unwrap(), Some("HostPath"));
    }

    #[test]
    fn test_empty_source_resolves_to_none() {
        assert_eq!(volume_source_kind(&VolumeSource::default()).unwrap(), None);
    }

    #[test]
    fn test_multiple_populated_fields_are_unresolvable() {
        let source = VolumeSource {
            empty_dir: Some(EmptyDirVolumeSource::default()),
            host_path: Some(HostPathVolumeSource::default()),
            ..Default::default()
        };
        assert_matches!(
            volume_source_kind(&source),
            Err(Error::VolumeSourceUnresolvable { populated })
                if populated == vec!["EmptyDir", "HostPath"]
        );
    }

    #[test]
    fn test_volume_carries_the_source() {
        let source = empty_dir_source();
        let volume = volume_with_source("registry-storage", &source);
        assert_eq!(volume.name, "registry-storage");
        assert_eq!(volume.empty_dir, source.empty_dir);
        assert!(volume.host_path.is_none());
    }
}
