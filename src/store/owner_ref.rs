use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use tracing::info;

use super::traits::{DataVolumeCache, DataVolumeClient};
use crate::errors::{Operation, StoreError, StoreResult};

/// Remove `(owner_kind, owner_name)` from a volume's ownerReferences.
///
/// An already-missing volume is an acceptable terminal state for a detach and
/// is treated as success. Entries belonging to other owners are preserved in
/// their original order, and the write is skipped entirely when the owner was
/// not present.
pub async fn detach_owner_ref(
    cache: &dyn DataVolumeCache,
    client: &dyn DataVolumeClient,
    namespace: &str,
    volume: &str,
    owner_kind: &str,
    owner_name: &str,
) -> StoreResult<()> {
    let dv = match cache.get(namespace, volume).await {
        Ok(dv) => dv,
        Err(e) if e.is_not_found() => {
            info!(
                namespace,
                volume, "skip owner reference removal, data volume not found"
            );
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let owners = dv.metadata.owner_references.clone().unwrap_or_default();
    let kept: Vec<OwnerReference> = owners
        .iter()
        .filter(|o| !(o.kind == owner_kind && o.name == owner_name))
        .cloned()
        .collect();

    if kept.len() == owners.len() {
        return Ok(());
    }

    // The cache hands out shared snapshots; mutate a copy only.
    let mut updated = (*dv).clone();
    updated.metadata.owner_references =
        if kept.is_empty() { None } else { Some(kept) };
    match client.update(&updated).await {
        // A volume that vanished between the cache read and the write is an
        // update failure of this cascade, not a missing primary resource;
        // re-wrap so it cannot surface to the caller as a 404.
        Err(e) if e.is_not_found() => Err(StoreError::dependency(
            Operation::UpdateDataVolume,
            namespace,
            volume,
            e,
        )),
        other => other,
    }
}
