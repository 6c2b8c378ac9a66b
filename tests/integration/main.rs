//! packcast integration test harness.
//!
//! Each test spins up its own pack server on 127.0.0.1:0 and talks to it
//! through the real resolver. Hosts are in-process recorders; no game
//! server is involved.
//!
//!   cargo test --test integration

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;

use packcast_core::config::ResolverSettings;
use packcast_core::ClientId;
use packcast_services::{HashForm, Host, HostError};

mod delivery;

// ── Pack server ───────────────────────────────────────────────────────────────

pub const LOBBY_DESCRIPTION: &str = "Lobby pack";

/// Build a pack archive with a `pack.mcmeta` carrying `description`.
pub fn pack_zip(description: &str) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    let mcmeta = format!(r#"{{"pack":{{"pack_format":15,"description":"{description}"}}}}"#);
    writer.start_file("pack.mcmeta", options).unwrap();
    writer.write_all(mcmeta.as_bytes()).unwrap();
    writer.start_file("assets/minecraft/lang/en_us.json", options).unwrap();
    writer.write_all(b"{}").unwrap();
    writer.finish().unwrap().into_inner()
}

/// Local HTTP server serving fixed pack bodies and failure statuses.
pub struct PackServer {
    base: String,
    pub lobby: Vec<u8>,
    pub arena: Vec<u8>,
    pub raw: Vec<u8>,
}

impl PackServer {
    /// Routes:
    ///   /lobby.zip  pack with metadata
    ///   /arena.zip  second pack, different bytes
    ///   /raw.bin    bytes that are not a zip
    ///   /big.bin    4 KiB of zeros
    ///   /error      500
    ///   /slow.zip   responds after 3 s
    ///   anything else 404
    pub async fn start() -> Result<Self> {
        let lobby = pack_zip(LOBBY_DESCRIPTION);
        let arena = pack_zip("Arena pack");
        let raw = b"not a zip archive at all".to_vec();

        let app = Router::new()
            .route("/lobby.zip", get({
                let body = lobby.clone();
                move || async move { body }
            }))
            .route("/arena.zip", get({
                let body = arena.clone();
                move || async move { body }
            }))
            .route("/raw.bin", get({
                let body = raw.clone();
                move || async move { body }
            }))
            .route("/big.bin", get(|| async { vec![0u8; 4096] }))
            .route("/error", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/slow.zip", get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                b"late".to_vec()
            }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind pack server")?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base: format!("http://{addr}"),
            lobby,
            arena,
            raw,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Resolver settings with a short timeout so the slow route trips it.
pub fn test_resolver_settings() -> ResolverSettings {
    ResolverSettings {
        timeout_secs: 1,
        max_pack_bytes: 1024 * 1024,
        ..ResolverSettings::default()
    }
}

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh document path under the temp dir.
pub fn temp_document() -> std::path::PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir()
        .join(format!("packcast-it-{}-{}", std::process::id(), id))
        .join("packs.toml")
}

// ── Recording host ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Push {
    pub client: ClientId,
    pub url: String,
    pub hash_hex: String,
}

/// Host that records every push and answers queries from sets the test
/// controls.
#[derive(Default)]
pub struct RecordingHost {
    pub pushes: Mutex<Vec<Push>>,
    pub holding: Mutex<HashSet<ClientId>>,
    pub declined: Mutex<HashSet<ClientId>>,
}

impl RecordingHost {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn pushes_to(&self, client: &ClientId) -> Vec<Push> {
        self.pushes
            .lock()
            .iter()
            .filter(|p| &p.client == client)
            .cloned()
            .collect()
    }
}

impl Host for RecordingHost {
    fn push_pack(&self, client: &ClientId, url: &str, hash: HashForm<'_>) -> Result<(), HostError> {
        let hash_hex = match hash {
            HashForm::Hex(h) => h.to_string(),
            HashForm::Binary(b) => b.iter().map(|byte| format!("{byte:02x}")).collect(),
        };
        self.pushes.lock().push(Push {
            client: *client,
            url: url.to_string(),
            hash_hex,
        });
        Ok(())
    }

    fn has_pack(&self, client: &ClientId) -> Result<bool, HostError> {
        Ok(self.holding.lock().contains(client))
    }

    fn is_declined(&self, client: &ClientId) -> Result<bool, HostError> {
        Ok(self.declined.lock().contains(client))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_pack_server_serves_archive() {
    let server = PackServer::start().await.expect("pack server should start");
    let archive = zip::ZipArchive::new(Cursor::new(server.lobby.clone()))
        .expect("lobby body should be a zip");
    assert!(archive.file_names().any(|n| n == "pack.mcmeta"));
    assert!(server.url("/lobby.zip").starts_with("http://127.0.0.1:"));
}
