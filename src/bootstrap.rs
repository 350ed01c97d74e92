use std::{sync::Arc, time::Duration};

use kube::Client;
use tracing::info;

use crate::{
    config::GatewayConfig,
    server::ApiServer,
    store::{
        KubeDataVolumeCache, KubeDataVolumeClient, KubeObjectStore,
        KubeVirtualMachineCache, VmStore,
    },
};

/// Wire the kube-backed collaborators into an [`ApiServer`].
///
/// The watch caches are spawned here and given `cache_warmup_secs` to catch
/// up with the cluster before the server starts answering requests.
pub async fn build_api_server(
    client: Client,
    cfg: GatewayConfig,
) -> anyhow::Result<ApiServer> {
    let namespace = cfg.k8s_namespace.as_deref();

    let (vm_cache, _vm_watch) =
        KubeVirtualMachineCache::spawn(client.clone(), namespace);
    let (dv_cache, _dv_watch) =
        KubeDataVolumeCache::spawn(client.clone(), namespace);

    let warmup = Duration::from_secs(cfg.cache_warmup_secs);
    tokio::time::timeout(warmup, async {
        vm_cache.wait_until_ready().await?;
        dv_cache.wait_until_ready().await
    })
    .await
    .map_err(|_| anyhow::anyhow!("watch caches not ready after {warmup:?}"))??;
    info!("watch caches warmed up");

    let vm_store = VmStore::new(
        Arc::new(KubeObjectStore::new(client.clone())),
        Arc::new(vm_cache),
        Arc::new(dv_cache),
        Arc::new(KubeDataVolumeClient::new(client)),
    );

    Ok(ApiServer::new(Arc::new(vm_store), cfg))
}
