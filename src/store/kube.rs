use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use kube::{
    Api, Client, ResourceExt,
    api::{DeleteParams, Patch, PatchParams, PostParams},
    runtime::{WatchStreamExt, reflector, reflector::ObjectRef, watcher},
};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::warn;

use super::traits::{
    DataVolumeCache, DataVolumeClient, ObjectStore, VirtualMachineCache,
};
use crate::crd::{DataVolume, VirtualMachine};
use crate::errors::{Operation, StoreError, StoreResult};

fn is_kube_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

/// Reflector-backed snapshot of VirtualMachine objects.
pub struct KubeVirtualMachineCache {
    store: reflector::Store<VirtualMachine>,
}

impl KubeVirtualMachineCache {
    /// Start a watch over VirtualMachines and return the cache together with
    /// its driver task. The task keeps the snapshot current until dropped.
    pub fn spawn(
        client: Client,
        namespace: Option<&str>,
    ) -> (Self, JoinHandle<()>) {
        let api: Api<VirtualMachine> = match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        let (reader, writer) = reflector::store();
        let task = tokio::spawn(async move {
            let stream = watcher(api, watcher::Config::default())
                .default_backoff()
                .reflect(writer)
                .applied_objects();
            futures_util::pin_mut!(stream);
            while let Some(item) = stream.next().await {
                if let Err(err) = item {
                    warn!(error = %err, "virtualmachine watch stream error");
                }
            }
        });
        (Self { store: reader }, task)
    }

    pub async fn wait_until_ready(&self) -> anyhow::Result<()> {
        self.store
            .wait_until_ready()
            .await
            .map_err(|_| anyhow::anyhow!("virtualmachine watch writer dropped"))
    }
}

#[async_trait]
impl VirtualMachineCache for KubeVirtualMachineCache {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Arc<VirtualMachine>> {
        let key = ObjectRef::new(name).within(namespace);
        self.store
            .get(&key)
            .ok_or_else(|| StoreError::not_found("virtualmachine", namespace, name))
    }

    async fn list(
        &self,
        namespace: &str,
    ) -> StoreResult<Vec<Arc<VirtualMachine>>> {
        Ok(self
            .store
            .state()
            .into_iter()
            .filter(|vm| vm.namespace().as_deref() == Some(namespace))
            .collect())
    }
}

/// Reflector-backed snapshot of DataVolume objects.
pub struct KubeDataVolumeCache {
    store: reflector::Store<DataVolume>,
}

impl KubeDataVolumeCache {
    pub fn spawn(
        client: Client,
        namespace: Option<&str>,
    ) -> (Self, JoinHandle<()>) {
        let api: Api<DataVolume> = match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        let (reader, writer) = reflector::store();
        let task = tokio::spawn(async move {
            let stream = watcher(api, watcher::Config::default())
                .default_backoff()
                .reflect(writer)
                .applied_objects();
            futures_util::pin_mut!(stream);
            while let Some(item) = stream.next().await {
                if let Err(err) = item {
                    warn!(error = %err, "datavolume watch stream error");
                }
            }
        });
        (Self { store: reader }, task)
    }

    pub async fn wait_until_ready(&self) -> anyhow::Result<()> {
        self.store
            .wait_until_ready()
            .await
            .map_err(|_| anyhow::anyhow!("datavolume watch writer dropped"))
    }
}

#[async_trait]
impl DataVolumeCache for KubeDataVolumeCache {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Arc<DataVolume>> {
        let key = ObjectRef::new(name).within(namespace);
        self.store
            .get(&key)
            .ok_or_else(|| StoreError::not_found("datavolume", namespace, name))
    }
}

/// Api-backed persistence for the VirtualMachine documents themselves.
pub struct KubeObjectStore {
    client: Client,
}

impl KubeObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<VirtualMachine> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn create(&self, namespace: &str, doc: Value) -> StoreResult<Value> {
        let vm: VirtualMachine = serde_json::from_value(doc).map_err(|e| {
            StoreError::dependency(
                Operation::CreateVirtualMachine,
                namespace,
                "",
                e,
            )
        })?;
        let name = vm.name_any();
        let created = self
            .api(namespace)
            .create(&PostParams::default(), &vm)
            .await
            .map_err(|e| {
                StoreError::dependency(
                    Operation::CreateVirtualMachine,
                    namespace,
                    &name,
                    e,
                )
            })?;
        serde_json::to_value(&created).map_err(|e| {
            StoreError::dependency(
                Operation::CreateVirtualMachine,
                namespace,
                &name,
                e,
            )
        })
    }

    async fn update(
        &self,
        namespace: &str,
        name: &str,
        doc: Value,
    ) -> StoreResult<Value> {
        let vm: VirtualMachine = serde_json::from_value(doc).map_err(|e| {
            StoreError::dependency(
                Operation::UpdateVirtualMachine,
                namespace,
                name,
                e,
            )
        })?;
        // replace() carries the document's resourceVersion, so a concurrent
        // writer surfaces as a conflict from the store.
        let updated = self
            .api(namespace)
            .replace(name, &PostParams::default(), &vm)
            .await
            .map_err(|e| {
                if is_kube_not_found(&e) {
                    StoreError::not_found("virtualmachine", namespace, name)
                } else {
                    StoreError::dependency(
                        Operation::UpdateVirtualMachine,
                        namespace,
                        name,
                        e,
                    )
                }
            })?;
        serde_json::to_value(&updated).map_err(|e| {
            StoreError::dependency(
                Operation::UpdateVirtualMachine,
                namespace,
                name,
                e,
            )
        })
    }

    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<Value> {
        // The delete call itself returns the deleted object (or a Status
        // when the apiserver finalizes asynchronously), so no prior read is
        // needed and there is no window for a concurrent delete to race.
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| {
                if is_kube_not_found(&e) {
                    StoreError::not_found("virtualmachine", namespace, name)
                } else {
                    StoreError::dependency(
                        Operation::DeleteVirtualMachine,
                        namespace,
                        name,
                        e,
                    )
                }
            })?
            .either(
                |vm| serde_json::to_value(&vm),
                |status| serde_json::to_value(&status),
            )
            .map_err(|e| {
                StoreError::dependency(
                    Operation::DeleteVirtualMachine,
                    namespace,
                    name,
                    e,
                )
            })
    }
}

/// Direct write client for DataVolume objects.
pub struct KubeDataVolumeClient {
    client: Client,
}

impl KubeDataVolumeClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<DataVolume> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl DataVolumeClient for KubeDataVolumeClient {
    async fn update(&self, volume: &DataVolume) -> StoreResult<()> {
        let namespace = volume.namespace().unwrap_or_default();
        let name = volume.name_any();

        // The gateway only ever edits ownership metadata, so the write is a
        // merge patch limited to that field. The resourceVersion from the
        // snapshot rides along as the optimistic-concurrency check; an
        // absent ownerReferences serializes as null, which clears the field.
        let mut metadata = serde_json::Map::new();
        if let Some(rv) = volume.resource_version() {
            metadata.insert("resourceVersion".to_string(), Value::String(rv));
        }
        metadata.insert(
            "ownerReferences".to_string(),
            serde_json::to_value(&volume.metadata.owner_references).map_err(
                |e| {
                    StoreError::dependency(
                        Operation::UpdateDataVolume,
                        &namespace,
                        &name,
                        e,
                    )
                },
            )?,
        );
        let patch = Value::Object(
            [("metadata".to_string(), Value::Object(metadata))]
                .into_iter()
                .collect(),
        );

        self.api(&namespace)
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map(|_| ())
            .map_err(|e| {
                if is_kube_not_found(&e) {
                    StoreError::not_found("datavolume", &namespace, &name)
                } else {
                    StoreError::dependency(
                        Operation::UpdateDataVolume,
                        &namespace,
                        &name,
                        e,
                    )
                }
            })
    }

    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<()> {
        self.api(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| {
                if is_kube_not_found(&e) {
                    StoreError::not_found("datavolume", namespace, name)
                } else {
                    StoreError::dependency(
                        Operation::DeleteDataVolume,
                        namespace,
                        name,
                        e,
                    )
                }
            })
    }
}
