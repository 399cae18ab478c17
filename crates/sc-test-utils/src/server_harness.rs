//! Test server harness for E2E testing
//!
//! Provides `TestScServer` for spawning real stream controller instances in
//! tests.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use stream_controller::config::Config;
use stream_controller::observability::metrics::init_metrics_recorder;
use stream_controller::registry::StreamRegistry;
use stream_controller::routes::{self, AppState};
use stream_controller::services::stream_processor::mock::MockStreamProcessor;
use stream_controller::services::StreamProcessor;
use tokio::task::JoinHandle;

/// Global metrics handle shared by every test server in the process.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder once per test binary.
///
/// Falls back to an unregistered recorder if another one is already
/// installed; `/metrics` then renders but stays empty.
pub fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Test harness for spawning the stream controller in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_add_flow_e2e() -> Result<(), anyhow::Error> {
///     let server = TestScServer::spawn().await?;
///     let client = reqwest::Client::new();
///
///     let response = client
///         .post(format!("{}/stream/cam1/add", server.url()))
///         .json(&serde_json::json!({"name": "cam1"}))
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestScServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    _handle: JoinHandle<()>,
}

impl TestScServer {
    /// Spawn a server with default configuration and an accepting mock
    /// stream processor.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(Arc::new(MockStreamProcessor::accepting()), &[]).await
    }

    /// Spawn a server around `processor`, with `overrides` applied on top of
    /// the test environment variables.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Start the HTTP server in the background
    pub async fn spawn_with(
        processor: Arc<dyn StreamProcessor>,
        overrides: &[(&str, &str)],
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("SC_INSTANCE_ID".to_string(), "sc-test".to_string()),
            ("SC_DRAIN_SECONDS".to_string(), "0".to_string()),
        ]);
        for (name, value) in overrides {
            vars.insert(name.to_string(), value.to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let state = Arc::new(AppState::new(config, processor));

        let app = routes::build_routes(state.clone(), test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// Direct access to the registry behind the HTTP surface.
    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.state.registry
    }
}

impl Drop for TestScServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
