#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::ResourceExt;
use serde_json::Value;

use vm_gateway::crd::{
    DataVolume, DataVolumeRef, DataVolumeSpec, VirtualMachine,
    VirtualMachineInstanceSpec, VirtualMachineInstanceTemplate,
    VirtualMachineSpec, Volume,
};
use vm_gateway::errors::{Operation, StoreError, StoreResult};
use vm_gateway::store::{
    DataVolumeCache, DataVolumeClient, ObjectStore, VirtualMachineCache,
    VmStore,
};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn dependency_error(op: Operation, namespace: &str, name: &str) -> StoreError {
    StoreError::dependency(
        op,
        namespace,
        name,
        std::io::Error::other("injected failure"),
    )
}

/// In-memory stand-in for the cluster: backs all four collaborator traits,
/// records every mutating call in order, and lets tests inject failures at
/// specific points.
#[derive(Default)]
pub struct FakeCluster {
    pub vms: Mutex<HashMap<Key, VirtualMachine>>,
    pub dvs: Mutex<HashMap<Key, DataVolume>>,

    pub created_docs: Mutex<Vec<Value>>,
    pub updated_docs: Mutex<Vec<Value>>,
    pub dv_updates: Mutex<Vec<String>>,
    pub dv_deletes: Mutex<Vec<String>>,
    pub vm_deletes: Mutex<Vec<String>>,

    pub fail_vm_get: Mutex<bool>,
    pub fail_vm_delete: Mutex<bool>,
    pub fail_dv_get: Mutex<Option<String>>,
    pub fail_dv_update: Mutex<Option<String>>,
    pub fail_dv_delete: Mutex<Option<String>>,
    /// Report this volume as already gone when its update is attempted, as
    /// if it were deleted between the cache read and the write.
    pub vanish_on_update: Mutex<Option<String>>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_vm(&self, vm: VirtualMachine) {
        let k = key(&vm.namespace().unwrap_or_default(), &vm.name_any());
        self.vms.lock().unwrap().insert(k, vm);
    }

    pub fn insert_dv(&self, dv: DataVolume) {
        let k = key(&dv.namespace().unwrap_or_default(), &dv.name_any());
        self.dvs.lock().unwrap().insert(k, dv);
    }

    pub fn data_volume(&self, namespace: &str, name: &str) -> Option<DataVolume> {
        self.dvs.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    pub fn has_vm(&self, namespace: &str, name: &str) -> bool {
        self.vms.lock().unwrap().contains_key(&key(namespace, name))
    }
}

#[async_trait]
impl ObjectStore for FakeCluster {
    async fn create(&self, _namespace: &str, doc: Value) -> StoreResult<Value> {
        self.created_docs.lock().unwrap().push(doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        _namespace: &str,
        _name: &str,
        doc: Value,
    ) -> StoreResult<Value> {
        self.updated_docs.lock().unwrap().push(doc.clone());
        Ok(doc)
    }

    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<Value> {
        if *self.fail_vm_delete.lock().unwrap() {
            return Err(dependency_error(
                Operation::DeleteVirtualMachine,
                namespace,
                name,
            ));
        }
        let removed = self
            .vms
            .lock()
            .unwrap()
            .remove(&key(namespace, name))
            .ok_or_else(|| {
                StoreError::not_found("virtualmachine", namespace, name)
            })?;
        self.vm_deletes.lock().unwrap().push(name.to_string());
        serde_json::to_value(&removed).map_err(|e| {
            StoreError::dependency(
                Operation::DeleteVirtualMachine,
                namespace,
                name,
                e,
            )
        })
    }
}

#[async_trait]
impl VirtualMachineCache for FakeCluster {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Arc<VirtualMachine>> {
        if *self.fail_vm_get.lock().unwrap() {
            return Err(dependency_error(
                Operation::GetVirtualMachine,
                namespace,
                name,
            ));
        }
        self.vms
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .map(Arc::new)
            .ok_or_else(|| {
                StoreError::not_found("virtualmachine", namespace, name)
            })
    }

    async fn list(
        &self,
        namespace: &str,
    ) -> StoreResult<Vec<Arc<VirtualMachine>>> {
        Ok(self
            .vms
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, vm)| Arc::new(vm.clone()))
            .collect())
    }
}

#[async_trait]
impl DataVolumeCache for FakeCluster {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Arc<DataVolume>> {
        if self.fail_dv_get.lock().unwrap().as_deref() == Some(name) {
            return Err(dependency_error(
                Operation::GetDataVolume,
                namespace,
                name,
            ));
        }
        self.dvs
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .map(Arc::new)
            .ok_or_else(|| {
                StoreError::not_found("datavolume", namespace, name)
            })
    }
}

#[async_trait]
impl DataVolumeClient for FakeCluster {
    async fn update(&self, volume: &DataVolume) -> StoreResult<()> {
        let namespace = volume.namespace().unwrap_or_default();
        let name = volume.name_any();
        if self.fail_dv_update.lock().unwrap().as_deref() == Some(name.as_str())
        {
            return Err(dependency_error(
                Operation::UpdateDataVolume,
                &namespace,
                &name,
            ));
        }
        if self.vanish_on_update.lock().unwrap().as_deref()
            == Some(name.as_str())
        {
            return Err(StoreError::not_found("datavolume", &namespace, &name));
        }
        let mut dvs = self.dvs.lock().unwrap();
        if !dvs.contains_key(&key(&namespace, &name)) {
            return Err(StoreError::not_found("datavolume", &namespace, &name));
        }
        dvs.insert(key(&namespace, &name), volume.clone());
        self.dv_updates.lock().unwrap().push(name);
        Ok(())
    }

    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<()> {
        if self.fail_dv_delete.lock().unwrap().as_deref() == Some(name) {
            return Err(dependency_error(
                Operation::DeleteDataVolume,
                namespace,
                name,
            ));
        }
        self.dvs
            .lock()
            .unwrap()
            .remove(&key(namespace, name))
            .ok_or_else(|| {
                StoreError::not_found("datavolume", namespace, name)
            })?;
        self.dv_deletes.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

pub fn vm_store(cluster: &Arc<FakeCluster>) -> VmStore {
    VmStore::new(
        cluster.clone(),
        cluster.clone(),
        cluster.clone(),
        cluster.clone(),
    )
}

/// VM with DataVolume-backed attachments given as (attachment, volume) pairs.
pub fn vm(
    namespace: &str,
    name: &str,
    disks: &[(&str, &str)],
) -> VirtualMachine {
    let volumes = disks
        .iter()
        .map(|(disk, dv)| Volume {
            name: disk.to_string(),
            data_volume: Some(DataVolumeRef {
                name: dv.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();
    let mut vm = VirtualMachine::new(
        name,
        VirtualMachineSpec {
            template: Some(VirtualMachineInstanceTemplate {
                spec: VirtualMachineInstanceSpec {
                    volumes,
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        },
    );
    vm.metadata.namespace = Some(namespace.to_string());
    vm
}

/// DataVolume owned by the given (kind, name) pairs.
pub fn dv(namespace: &str, name: &str, owners: &[(&str, &str)]) -> DataVolume {
    let mut dv = DataVolume::new(name, DataVolumeSpec::default());
    dv.metadata.namespace = Some(namespace.to_string());
    if !owners.is_empty() {
        dv.metadata.owner_references = Some(
            owners
                .iter()
                .map(|(kind, owner)| OwnerReference {
                    api_version: "kubevirt.io/v1".to_string(),
                    kind: kind.to_string(),
                    name: owner.to_string(),
                    uid: format!("uid-{owner}"),
                    ..Default::default()
                })
                .collect(),
        );
    }
    dv
}

pub fn owner_names(dv: &DataVolume) -> Vec<String> {
    dv.metadata
        .owner_references
        .clone()
        .unwrap_or_default()
        .iter()
        .map(|o| o.name.clone())
        .collect()
}
