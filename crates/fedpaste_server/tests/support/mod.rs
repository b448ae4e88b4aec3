//! Shared integration-test server bootstrap helpers.

#![allow(dead_code)]

use axum_test::TestServer;
use fedpaste_server::{create_app, serve_router, AppState, Config, Database};
use std::collections::HashMap;
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub(crate) const ADMIN_PASSWORD: &str = "admin-secret";

pub(crate) fn test_config(dir: &TempDir) -> Config {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert(
        "DATA_DIR".to_string(),
        dir.path().to_string_lossy().to_string(),
    );
    vars.insert("ADMIN_PASSWORD".to_string(), ADMIN_PASSWORD.to_string());
    vars.insert("FEDERATION_SCHEME".to_string(), "http".to_string());
    vars.insert("PORT".to_string(), "0".to_string());
    Config::from_lookup(move |key| vars.get(key).cloned())
}

pub(crate) async fn open_state(dir: &TempDir) -> AppState {
    let config = test_config(dir);
    let db = Database::open(&config).await.expect("open db");
    AppState::new(config, db)
}

pub(crate) async fn setup_test_server() -> (TestServer, AppState, TempDir) {
    let temp_dir = TempDir::new().expect("temp dir");
    let state = open_state(&temp_dir).await;
    let app = create_app(state.clone(), false);
    let server = TestServer::new(app).expect("server");
    (server, state, temp_dir)
}

/// A server listening on a real loopback port.
pub(crate) struct RunningPeer {
    pub addr: SocketAddr,
    pub state: AppState,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), std::io::Error>>,
    _dir: TempDir,
}

impl RunningPeer {
    pub(crate) async fn start() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let state = open_state(&dir).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve_router(listener, state.clone(), false, async move {
            let _ = shutdown_rx.await;
        }));
        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
            handle,
            _dir: dir,
        }
    }

    pub(crate) fn host(&self) -> String {
        self.addr.to_string()
    }

    pub(crate) async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.handle
            .await
            .expect("join")
            .expect("server exits cleanly");
    }
}
