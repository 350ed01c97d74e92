use crate::{api::handlers, config::GatewayConfig, store::VmStore};
use axum::{
    Json, Router,
    routing::{delete, get, post, put},
};
use serde_json::{Value, json};
use std::{net::SocketAddr, sync::Arc};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub vm_store: Arc<VmStore>,
}

pub struct ApiServer {
    app: Router,
    config: GatewayConfig,
}

impl ApiServer {
    pub fn new(vm_store: Arc<VmStore>, config: GatewayConfig) -> Self {
        let state = AppState { vm_store };

        let app = Router::new()
            .route(
                "/api/v1/namespaces/{namespace}/virtualmachines",
                post(handlers::create_vm),
            )
            .route(
                "/api/v1/namespaces/{namespace}/virtualmachines",
                get(handlers::list_vms),
            )
            .route(
                "/api/v1/namespaces/{namespace}/virtualmachines/{name}",
                get(handlers::get_vm),
            )
            .route(
                "/api/v1/namespaces/{namespace}/virtualmachines/{name}",
                put(handlers::update_vm),
            )
            .route(
                "/api/v1/namespaces/{namespace}/virtualmachines/{name}",
                delete(handlers::delete_vm),
            )
            .route("/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        Self { app, config }
    }

    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        info!("VM gateway API server listening on {}", addr);
        axum::serve(listener, self.app).await?;

        Ok(())
    }
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "vm-gateway",
    }))
}
