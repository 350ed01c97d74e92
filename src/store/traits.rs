use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::crd::{DataVolume, VirtualMachine};
use crate::errors::StoreResult;

/// Generic persistence pipeline the gateway wraps. Owns schema validation
/// and the base create/update/delete mechanics for VirtualMachine documents.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn create(&self, namespace: &str, doc: Value) -> StoreResult<Value>;
    async fn update(
        &self,
        namespace: &str,
        name: &str,
        doc: Value,
    ) -> StoreResult<Value>;
    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<Value>;
}

/// Watch-populated snapshot of VirtualMachine objects. Lookups may lag the
/// authoritative store; callers must treat every result as possibly stale.
#[async_trait]
pub trait VirtualMachineCache: Send + Sync {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Arc<VirtualMachine>>;
    async fn list(&self, namespace: &str)
    -> StoreResult<Vec<Arc<VirtualMachine>>>;
}

/// Watch-populated snapshot of DataVolume objects. Returned objects are
/// shared; clone before mutating.
#[async_trait]
pub trait DataVolumeCache: Send + Sync {
    async fn get(
        &self,
        namespace: &str,
        name: &str,
    ) -> StoreResult<Arc<DataVolume>>;
}

/// Authoritative write path for DataVolume objects. Updates carry the
/// object's resourceVersion, so concurrent writers surface as conflicts.
#[async_trait]
pub trait DataVolumeClient: Send + Sync {
    async fn update(&self, volume: &DataVolume) -> StoreResult<()>;
    async fn delete(&self, namespace: &str, name: &str) -> StoreResult<()>;
}
