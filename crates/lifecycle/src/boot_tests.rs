use super::*;
use crate::config::{ClusterConfig, LogConfig, TransportConfig};
use crate::runtime::Runtime;
use async_trait::async_trait;
use fns_dispatch::NoRemoteCaller;
use fns_registry::ServiceRegistry;
use std::sync::Arc;
use std::time::Duration;

fn config() -> Config {
    Config {
        name: "orders".to_string(),
        version: "1.0.0".to_string(),
        log: LogConfig::default(),
        cluster: ClusterConfig { node_id: "node-1".to_string(), ..Default::default() },
        transport: TransportConfig::default(),
        services: Default::default(),
    }
}

fn runtime() -> Arc<Runtime> {
    Arc::new(Runtime::new(&config(), Arc::new(ServiceRegistry::new("node-1")), Arc::new(NoRemoteCaller)))
}

struct ImmediateReturn;

#[async_trait]
impl Transport for ImmediateReturn {
    async fn serve(self, _runtime: Arc<Runtime>) -> Result<(), TransportError> {
        Ok(())
    }
}

struct AlwaysFails;

#[async_trait]
impl Transport for AlwaysFails {
    async fn serve(self, _runtime: Arc<Runtime>) -> Result<(), TransportError> {
        Err(TransportError::Bind("address in use".to_string()))
    }
}

#[tokio::test]
async fn clean_run_exits_zero() {
    let code = run(runtime(), ImmediateReturn, Duration::from_secs(1)).await;
    assert_eq!(code, 0);
}

#[tokio::test]
async fn transport_failure_exits_nonzero() {
    let code = run(runtime(), AlwaysFails, Duration::from_secs(1)).await;
    assert_eq!(code, 1);
}
