use envconfig::Envconfig;

#[derive(Envconfig, Clone, Debug)]
pub struct GatewayConfig {
    #[envconfig(from = "VMGW_HTTP_PORT", default = "8181")]
    pub http_port: u16,

    /// Restrict the watch caches to a single namespace; unset watches the
    /// whole cluster.
    /// Env: VMGW_K8S_NAMESPACE
    #[envconfig(from = "VMGW_K8S_NAMESPACE")]
    pub k8s_namespace: Option<String>,

    /// How long to wait for the watch caches to catch up before serving.
    /// Env: VMGW_CACHE_WARMUP_SECS
    #[envconfig(from = "VMGW_CACHE_WARMUP_SECS", default = "30")]
    pub cache_warmup_secs: u64,
}
