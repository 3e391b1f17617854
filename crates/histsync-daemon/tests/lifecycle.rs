//! Integration tests for the daemon server lifecycle.
//!
//! Each test boots a daemon with a real HTTP listener on an ephemeral port,
//! connects a client, and exercises the API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use histsync_client::database::Database;
use histsync_client::history_file::HistoryFile;
use histsync_client::settings::Settings;
use histsync_client::sync::SyncEngine;
use histsync_daemon::components::{SchedulerComponent, StatusComponent};
use histsync_daemon::{Daemon, DaemonHandle, server};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

struct TestDaemon {
    addr: SocketAddr,
    handle: DaemonHandle,
    client: reqwest::Client,
    history_path: PathBuf,
    _tmp: TempDir,
}

impl TestDaemon {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn get(&self, path: &str) -> Value {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        assert!(resp.status().is_success(), "GET {path}: {}", resp.status());
        resp.json().await.unwrap()
    }

    async fn post(&self, path: &str) -> Value {
        let resp = self.client.post(self.url(path)).send().await.unwrap();
        assert!(resp.status().is_success(), "POST {path}: {}", resp.status());
        resp.json().await.unwrap()
    }
}

/// Spins up a daemon on an ephemeral port. The scheduler is registered but
/// disabled so the tests control when imports happen.
async fn start_test_daemon() -> TestDaemon {
    let tmp = tempfile::tempdir().unwrap();

    let db_path = tmp.path().join("history.db");
    let history_path = tmp.path().join(".zsh_history");

    let settings: Settings = Settings::builder()
        .expect("could not build settings builder")
        .set_override("db_path", db_path.to_str().unwrap())
        .expect("failed to set db_path")
        .set_override("history_path", history_path.to_str().unwrap())
        .expect("failed to set history_path")
        .set_override("server.port", 0)
        .expect("failed to set server.port")
        .set_override("daemon.sync_enabled", false)
        .expect("failed to set daemon.sync_enabled")
        .build()
        .expect("could not build settings")
        .try_deserialize()
        .expect("could not deserialize settings");

    let db = Database::new(settings.db_path(), settings.db_timeout)
        .await
        .unwrap();
    let engine = SyncEngine::new(HistoryFile::new(settings.history_path()), db);

    let listener = server::bind(&settings.bind_address()).await.unwrap();

    let mut daemon = Daemon::builder(settings)
        .engine(engine)
        .component(StatusComponent::new())
        .component(SchedulerComponent::new())
        .build()
        .unwrap();

    let handle = daemon.handle();

    daemon.start_components().await.unwrap();

    let (addr, server) = server::run_http_server(listener, handle.clone()).unwrap();

    tokio::spawn(async move {
        daemon.run_event_loop().await.unwrap();
        server.await.unwrap();
        daemon.stop_components().await;
    });

    TestDaemon {
        addr,
        handle,
        client: reqwest::Client::new(),
        history_path,
        _tmp: tmp,
    }
}

fn commands(json: &Value) -> Vec<String> {
    json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["command"].as_str().unwrap().to_string())
        .collect()
}

/// The status component records outcomes off the event bus, so the report
/// can trail the response that caused it.
async fn wait_for_last_sync(daemon: &TestDaemon, kind: &str) -> Value {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let json = daemon.get("/healthz").await;
            if json["data"]["last_sync"]["kind"] == kind {
                return json["data"]["last_sync"].clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("timed out waiting for the sync report")
}

#[tokio::test]
async fn test_health() {
    let daemon = start_test_daemon().await;

    let json = daemon.get("/healthz").await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_import_filter_export() {
    let daemon = start_test_daemon().await;
    std::fs::write(
        &daemon.history_path,
        ": 1700000000:0;git status\n: 1700000001:0;git log\n: 1700000002:0;ls -la\n",
    )
    .unwrap();

    let json = daemon.post("/api/v1/saveAllHistory").await;
    assert_eq!(json["message"], server::IMPORTED_MESSAGE);

    let last_sync = wait_for_last_sync(&daemon, "import").await;
    assert_eq!(last_sync["count"], 3);

    let json = daemon.get("/api/v1/allCommands").await;
    assert_eq!(commands(&json), vec!["git status", "git log", "ls -la"]);

    let json = daemon.get("/api/v1/commands?keyword=git").await;
    assert_eq!(commands(&json), vec!["git status", "git log"]);

    std::fs::remove_file(&daemon.history_path).unwrap();

    let json = daemon.post("/api/v1/writeAllCommandsToHistory").await;
    assert_eq!(json["message"], server::EXPORTED_MESSAGE);

    let last_sync = wait_for_last_sync(&daemon, "export").await;
    assert_eq!(last_sync["count"], 3);

    let written = HistoryFile::new(&daemon.history_path)
        .read_all()
        .await
        .unwrap();
    assert_eq!(written, vec!["git status", "git log", "ls -la"]);
}

#[tokio::test]
async fn test_force_import_event() {
    let daemon = start_test_daemon().await;
    std::fs::write(&daemon.history_path, ": 1:0;echo forced\n").unwrap();

    let mut rx = daemon.handle.subscribe();
    daemon.handle.emit(histsync_daemon::DaemonEvent::ForceImport);

    let event = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let ev @ histsync_daemon::DaemonEvent::ImportCompleted { .. } =
                rx.recv().await.unwrap()
            {
                return ev;
            }
        }
    })
    .await
    .expect("timed out waiting for import");

    assert_eq!(
        event,
        histsync_daemon::DaemonEvent::ImportCompleted { imported: 1 }
    );

    let json = daemon.get("/api/v1/allCommands").await;
    assert_eq!(commands(&json), vec!["echo forced"]);
}

#[tokio::test]
async fn test_shutdown() {
    let daemon = start_test_daemon().await;

    daemon.get("/healthz").await;
    daemon.handle.shutdown();

    // Give server time to shut down.
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Subsequent calls should fail since the server is gone. A fresh client
    // avoids reusing a pooled connection.
    let result = reqwest::Client::new()
        .get(daemon.url("/healthz"))
        .send()
        .await;
    assert!(result.is_err());
}
