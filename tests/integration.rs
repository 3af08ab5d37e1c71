use serde_json::{Value, json};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use hybrid_native_bridge::blob::{BlobHandle, BlobOwner};
use hybrid_native_bridge::config::AppConfig;
use hybrid_native_bridge::error::ErrorCode;
use hybrid_native_bridge::{Bridge, HostConfig, Server};

// Helper to build a host configuration rooted in a temporary directory
fn test_config(dir: &TempDir) -> HostConfig {
    let base = dir.path().to_string_lossy().into_owned();
    HostConfig {
        bind_address: "127.0.0.1".into(),
        port: 0,
        files_dir: format!("{}/files", base),
        cache_dir: format!("{}/cache", base),
        master_key_path: format!("{}/master.key", base),
        preferences_path: format!("{}/preferences.json", base),
        app: AppConfig {
            runtime_url: Some("runtime.example.com".into()),
            ..AppConfig::default()
        },
        ..HostConfig::default()
    }
}

struct Sandbox {
    _dir: TempDir,
    bridge: Bridge,
    owner: BlobOwner,
    files: String,
}

impl Sandbox {
    fn new(encryption_enabled: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = HostConfig {
            encryption_enabled,
            ..test_config(&dir)
        };
        let bridge = Bridge::from_config(&config).unwrap();
        let files = bridge.fs.constants()["DocumentDirectoryPath"]
            .as_str()
            .unwrap()
            .to_string();
        let owner = bridge.blobs.new_owner();
        Self {
            _dir: dir,
            bridge,
            owner,
            files,
        }
    }

    fn path(&self, name: &str) -> String {
        format!("{}/{}", self.files, name)
    }

    fn save(&self, data: &[u8], path: &str) -> Result<Value, hybrid_native_bridge::error::BridgeError> {
        let handle = self.bridge.blobs.store(self.owner, data.to_vec());
        self.bridge.fs.save(&handle, path)
    }

    fn read(&self, path: &str) -> Option<Vec<u8>> {
        let value = self.bridge.fs.read(path, self.owner).unwrap();
        if value.is_null() {
            return None;
        }
        let handle: BlobHandle = serde_json::from_value(value).unwrap();
        self.bridge.blobs.take(&handle)
    }
}

#[test]
fn every_guarded_operation_rejects_paths_outside_the_roots() {
    let sandbox = Sandbox::new(false);
    let fs = &sandbox.bridge.fs;
    let inside = sandbox.path("inside");
    sandbox.save(b"x", &inside).unwrap();

    for outside in ["/etc/hosts", "relative/path", "", "/"] {
        let blob = sandbox.bridge.blobs.store(sandbox.owner, b"payload".to_vec());
        let results = [
            fs.save(&blob, outside),
            fs.read(outside, sandbox.owner),
            fs.move_path(outside, &inside),
            fs.move_path(&inside, outside),
            fs.remove(outside),
            fs.file_exists(outside),
            fs.write_json(&json!({ "a": 1 }), outside),
            fs.read_json(outside),
            fs.read_as_data_url(outside),
        ];
        for result in results {
            assert_eq!(result.unwrap_err().code, ErrorCode::InvalidPath, "{:?}", outside);
        }
    }
    // Rejected saves still give their payload back.
    assert!(sandbox.bridge.blobs.is_empty());
    assert_eq!(sandbox.read(&inside).unwrap(), b"x");
}

#[test]
fn moving_a_directory_onto_or_into_itself_keeps_its_contents() {
    let sandbox = Sandbox::new(true);
    let fs = &sandbox.bridge.fs;
    let tree = sandbox.path("tree");
    sandbox.save(b"leaf", &sandbox.path("tree/leaf")).unwrap();

    assert_eq!(fs.move_path(&tree, &tree), Ok(Value::Null));
    let err = fs.move_path(&tree, &sandbox.path("tree/nested")).unwrap_err();
    assert_eq!(err.code, ErrorCode::MoveFailed);

    assert_eq!(fs.list(&tree), Ok(json!(["leaf"])));
    assert_eq!(sandbox.read(&sandbox.path("tree/leaf")).unwrap(), b"leaf");
}

#[test]
fn list_of_absent_or_plain_file_paths_is_empty_anywhere() {
    let sandbox = Sandbox::new(false);
    sandbox.save(b"x", &sandbox.path("file")).unwrap();

    for path in [
        sandbox.path("missing"),
        sandbox.path("file"),
        "/definitely/not/here".to_string(),
        "/etc/hosts".to_string(),
    ] {
        assert_eq!(sandbox.bridge.fs.list(&path), Ok(json!([])), "{}", path);
    }
}

#[test]
fn save_then_read_returns_the_same_bytes_in_each_encryption_state() {
    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    for encrypted in [false, true] {
        let sandbox = Sandbox::new(encrypted);
        let path = sandbox.path("nested/dir/blob.bin");
        sandbox.save(&payload, &path).unwrap();
        assert_eq!(sandbox.read(&path).unwrap(), payload);

        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(on_disk == payload, !encrypted);
    }
}

#[test]
fn json_round_trip_preserves_structure() {
    let sandbox = Sandbox::new(true);
    let path = sandbox.path("state/session.json");
    let object = json!({
        "nested": { "deeper": { "list": [1, "two", 3.5, false, null, { "k": "v" }] } },
        "text": "héllo",
        "count": -42,
        "flag": true,
        "nothing": null
    });

    sandbox.bridge.fs.write_json(&object, &path).unwrap();
    assert_eq!(sandbox.bridge.fs.read_json(&path), Ok(object));
}

#[test]
fn read_json_of_missing_file_is_the_string_null() {
    let sandbox = Sandbox::new(false);
    let result = sandbox.bridge.fs.read_json(&sandbox.path("absent.json")).unwrap();
    assert_eq!(result, Value::String("null".into()));
    assert!(!result.is_null());
}

#[test]
fn move_relocates_files_and_whole_trees() {
    let sandbox = Sandbox::new(false);
    let fs = &sandbox.bridge.fs;
    sandbox.save(b"a", &sandbox.path("tree/a")).unwrap();
    sandbox.save(b"b", &sandbox.path("tree/sub/b")).unwrap();
    sandbox.save(b"c", &sandbox.path("tree/sub/deeper/c")).unwrap();

    fs.move_path(&sandbox.path("tree/a"), &sandbox.path("single/a")).unwrap();
    assert_eq!(fs.file_exists(&sandbox.path("tree/a")), Ok(json!(false)));
    assert_eq!(fs.file_exists(&sandbox.path("single/a")), Ok(json!(true)));

    fs.move_path(&sandbox.path("tree"), &sandbox.path("moved")).unwrap();
    assert_eq!(fs.file_exists(&sandbox.path("tree")), Ok(json!(false)));
    assert_eq!(sandbox.read(&sandbox.path("moved/sub/b")).unwrap(), b"b");
    assert_eq!(sandbox.read(&sandbox.path("moved/sub/deeper/c")).unwrap(), b"c");
}

#[test]
fn remove_of_missing_path_succeeds() {
    let sandbox = Sandbox::new(false);
    assert_eq!(sandbox.bridge.fs.remove(&sandbox.path("never-existed")), Ok(Value::Null));
    assert_eq!(sandbox.bridge.fs.remove(&sandbox.path("never/existed/dir")), Ok(Value::Null));
}

#[test]
fn concurrent_writes_leave_one_writers_content() {
    for encrypted in [false, true] {
        let sandbox = Arc::new(Sandbox::new(encrypted));
        let path = sandbox.path("contended.bin");
        let first = vec![b'a'; 8 * 1024];
        let second = vec![b'b'; 8 * 1024];

        let writers: Vec<_> = [first.clone(), second.clone()]
            .into_iter()
            .map(|payload| {
                let sandbox = Arc::clone(&sandbox);
                let path = path.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        sandbox.save(&payload, &path).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let stored = sandbox.read(&path).unwrap();
        assert!(stored == first || stored == second);
        // No temp files left behind.
        assert_eq!(sandbox.bridge.fs.list(&sandbox.files), Ok(json!(["contended.bin"])));
    }
}

// Helpers for talking to a running host
struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn open(server: &Server) -> Self {
        let stream = TcpStream::connect(server.local_addr().unwrap()).await.unwrap();
        let (read_half, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer,
        }
    }

    async fn send(&mut self, request: Value) {
        let line = format!("{}\n", request);
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn receive(&mut self) -> Option<Value> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await.unwrap();
        if n == 0 {
            return None;
        }
        Some(serde_json::from_str(&line).unwrap())
    }

    async fn call(&mut self, request: Value) -> Value {
        self.send(request).await;
        self.receive().await.unwrap()
    }
}

async fn start_server(config: HostConfig) -> Arc<Server> {
    let server = Arc::new(Server::new(config).await.unwrap());
    let running = Arc::clone(&server);
    tokio::spawn(async move { running.start().await });
    server
}

#[tokio::test]
async fn tcp_round_trip_through_every_module() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(test_config(&dir)).await;
    let files = server.bridge().fs.constants()["DocumentDirectoryPath"]
        .as_str()
        .unwrap()
        .to_string();
    let mut conn = Connection::open(&server).await;

    let constants = conn.call(json!({ "id": 1, "method": "config.getConstants" })).await;
    assert_eq!(constants["id"], 1);
    assert_eq!(constants["result"]["RUNTIME_URL"], "http://runtime.example.com/");

    // Fire-and-forget, answered by nothing.
    conn.send(json!({ "method": "fs.setEncryptionEnabled", "args": [true] }))
        .await;

    let created = conn
        .call(json!({ "id": "c", "method": "blob.create", "args": ["AAECAw=="] }))
        .await;
    let handle = created["result"].clone();

    let path = format!("{}/wire/data.bin", files);
    let saved = conn
        .call(json!({ "id": 2, "method": "fs.save", "args": [handle, path] }))
        .await;
    assert_eq!(saved, json!({ "id": 2, "result": null }));

    let read = conn
        .call(json!({ "id": 3, "method": "fs.read", "args": [path] }))
        .await;
    let fetched = conn
        .call(json!({ "id": 4, "method": "blob.read", "args": [read["result"]] }))
        .await;
    assert_eq!(fetched["result"], "AAECAw==");

    let listed = conn
        .call(json!({ "id": 5, "method": "fs.list", "args": [format!("{}/wire", files)] }))
        .await;
    assert_eq!(listed["result"], json!(["data.bin"]));

    let rejected = conn
        .call(json!({ "id": 6, "method": "fs.read", "args": ["/etc/hosts"] }))
        .await;
    assert_eq!(rejected["error"]["code"], "INVALID_PATH");

    let prefs = conn
        .call(json!({ "id": 7, "method": "prefs.setDevMode", "args": [true] }))
        .await;
    assert_eq!(prefs["result"], Value::Null);

    let reported = conn
        .call(json!({ "id": 8, "method": "errorHandler.handle", "args": ["boom", []] }))
        .await;
    assert_eq!(reported["result"], Value::Null);

    assert!(server.bridge().fs.backend().is_encryption_enabled());
}

#[tokio::test]
async fn concurrent_requests_on_one_connection_all_complete() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(test_config(&dir)).await;
    let files = server.bridge().fs.constants()["DocumentDirectoryPath"]
        .as_str()
        .unwrap()
        .to_string();
    let mut conn = Connection::open(&server).await;

    for id in 0..20 {
        conn.send(json!({
            "id": id,
            "method": "fs.writeJson",
            "args": [{ "n": id }, format!("{}/many/{}.json", files, id)]
        }))
        .await;
    }

    let mut seen: Vec<i64> = Vec::new();
    for _ in 0..20 {
        let completion = conn.receive().await.unwrap();
        assert_eq!(completion["result"], Value::Null);
        seen.push(completion["id"].as_i64().unwrap());
    }
    seen.sort_unstable();
    assert_eq!(seen, (0..20).collect::<Vec<_>>());
}

#[tokio::test]
async fn oversized_requests_are_rejected_and_the_connection_survives() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(HostConfig {
        max_request_length: 256,
        ..test_config(&dir)
    })
    .await;
    let mut conn = Connection::open(&server).await;

    let huge = "A".repeat(1024);
    let rejected = conn
        .call(json!({ "id": 1, "method": "blob.create", "args": [huge] }))
        .await;
    assert_eq!(rejected["id"], Value::Null);
    assert_eq!(rejected["error"]["code"], "ERROR_INVALID_ARGUMENT");

    let ok = conn.call(json!({ "id": 2, "method": "fs.getConstants" })).await;
    assert_eq!(ok["result"]["SUPPORTS_ENCRYPTION"], true);
}

#[tokio::test]
async fn connections_beyond_the_limit_are_refused() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(HostConfig {
        max_clients: 1,
        ..test_config(&dir)
    })
    .await;

    let mut first = Connection::open(&server).await;
    // Registered once it has answered.
    let constants = first.call(json!({ "id": 1, "method": "fs.getConstants" })).await;
    assert_eq!(constants["id"], 1);

    let mut second = Connection::open(&server).await;
    let refusal = second.receive().await.unwrap();
    assert_eq!(refusal["error"]["code"], "ERROR_INTERNAL");
    assert_eq!(second.receive().await, None);

    let still_served = first.call(json!({ "id": 2, "method": "fs.getConstants" })).await;
    assert_eq!(still_served["id"], 2);
}

#[tokio::test]
async fn disconnect_releases_handles_the_peer_never_fetched() {
    let dir = tempfile::tempdir().unwrap();
    let server = start_server(test_config(&dir)).await;
    let files = server.bridge().fs.constants()["DocumentDirectoryPath"]
        .as_str()
        .unwrap()
        .to_string();
    let path = format!("{}/kept.bin", files);

    let mut conn = Connection::open(&server).await;
    let created = conn
        .call(json!({ "id": 1, "method": "blob.create", "args": ["AQI="] }))
        .await;
    conn.call(json!({ "id": 2, "method": "fs.save", "args": [created["result"], path] }))
        .await;
    for id in 3..6 {
        let read = conn
            .call(json!({ "id": id, "method": "fs.read", "args": [path] }))
            .await;
        assert_eq!(read["result"]["size"], 2);
    }
    conn.call(json!({ "id": 6, "method": "blob.create", "args": ["AA=="] }))
        .await;
    assert_eq!(server.bridge().blobs.len(), 4);

    drop(conn);
    for _ in 0..100 {
        if server.bridge().blobs.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(server.bridge().blobs.is_empty());
}
