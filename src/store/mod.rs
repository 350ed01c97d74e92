mod kube;
mod normalizer;
mod owner_ref;
mod traits;
mod volumes;

pub use kube::{
    KubeDataVolumeCache, KubeDataVolumeClient, KubeObjectStore,
    KubeVirtualMachineCache,
};
pub use normalizer::normalize_data_volume_templates;
pub use owner_ref::detach_owner_ref;
pub use traits::{
    DataVolumeCache, DataVolumeClient, ObjectStore, VirtualMachineCache,
};
pub use volumes::delete_data_volumes;

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::crd::{VIRTUAL_MACHINE_KIND, VirtualMachine};
use crate::errors::StoreResult;

/// Front for the generic object store that adds the gateway's pre/post
/// logic: provisioning-source normalization on create/update and the
/// detach-or-destroy cascade on delete.
pub struct VmStore {
    store: Arc<dyn ObjectStore>,
    vm_cache: Arc<dyn VirtualMachineCache>,
    dv_cache: Arc<dyn DataVolumeCache>,
    dv_client: Arc<dyn DataVolumeClient>,
}

impl VmStore {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        vm_cache: Arc<dyn VirtualMachineCache>,
        dv_cache: Arc<dyn DataVolumeCache>,
        dv_client: Arc<dyn DataVolumeClient>,
    ) -> Self {
        Self {
            store,
            vm_cache,
            dv_cache,
            dv_client,
        }
    }

    pub async fn create(
        &self,
        namespace: &str,
        mut doc: Value,
    ) -> StoreResult<Value> {
        normalizer::normalize_data_volume_templates(&mut doc);
        self.store.create(namespace, doc).await
    }

    pub async fn update(
        &self,
        namespace: &str,
        name: &str,
        mut doc: Value,
    ) -> StoreResult<Value> {
        normalizer::normalize_data_volume_templates(&mut doc);
        self.store.update(namespace, name, doc).await
    }

    pub async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Arc<VirtualMachine>> {
        self.vm_cache.get(namespace, name).await
    }

    pub async fn list(
        &self,
        namespace: &str,
    ) -> StoreResult<Vec<Arc<VirtualMachine>>> {
        self.vm_cache.list(namespace).await
    }

    /// Delete a VM together with the attached DataVolumes named (by
    /// attachment name) in `removed_disks`, detaching every other attached
    /// DataVolume from this VM's ownership.
    ///
    /// Ordering: owner references are stripped first so the platform's
    /// reference-based garbage collection cannot reclaim kept volumes when
    /// the VM object disappears; the VM object is deleted before the removed
    /// volumes so its record never points at a volume that no longer exists.
    /// A failure in the final volume sweep is surfaced, but the completed VM
    /// deletion is not rolled back.
    pub async fn delete(
        &self,
        namespace: &str,
        name: &str,
        removed_disks: &[String],
    ) -> StoreResult<Value> {
        let vm = self.vm_cache.get(namespace, name).await?;

        let (saved, removed) = partition_data_volumes(&vm, removed_disks);
        info!(
            namespace,
            name,
            saved = saved.len(),
            removed = removed.len(),
            "cascading virtual machine delete"
        );

        for volume in &saved {
            detach_owner_ref(
                self.dv_cache.as_ref(),
                self.dv_client.as_ref(),
                namespace,
                volume,
                VIRTUAL_MACHINE_KIND,
                name,
            )
            .await?;
        }

        let deleted = self.store.delete(namespace, name).await?;

        delete_data_volumes(self.dv_client.as_ref(), namespace, &removed)
            .await?;

        Ok(deleted)
    }
}

/// Split the VM's DataVolume-backed attachments into (saved, removed)
/// DataVolume names. The partition is keyed strictly on the attachment's own
/// template name against `removed_disks`; attachments without a DataVolume
/// reference are ignored.
fn partition_data_volumes(
    vm: &VirtualMachine,
    removed_disks: &[String],
) -> (Vec<String>, Vec<String>) {
    let mut saved = Vec::new();
    let mut removed = Vec::new();

    if let Some(template) = &vm.spec.template {
        for vol in &template.spec.volumes {
            let Some(dv) = &vol.data_volume else {
                continue;
            };
            if removed_disks.contains(&vol.name) {
                removed.push(dv.name.clone());
            } else {
                saved.push(dv.name.clone());
            }
        }
    }

    (saved, removed)
}
