//! Remote loading against a local HTTP server serving fixture GGUF files

mod common;

use common::*;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use tensorplace::loader::{load_model_from, RemoteLoader};
use tensorplace::model::MetadataValue;

/// Minimal HTTP/1.1 file server: one request per connection
struct FileServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl FileServer {
    fn start(files: HashMap<String, Vec<u8>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                serve(stream, &files, &log);
            }
        });
        Self { base_url, requests }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn serve(stream: TcpStream, files: &HashMap<String, Vec<u8>>, log: &Mutex<Vec<String>>) {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let mut header = String::new();
    while reader.read_line(&mut header).map(|n| n > 2).unwrap_or(false) {
        header.clear();
    }

    let target = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
    log.lock().unwrap().push(target.clone());
    let path = target.split('?').next().unwrap_or("/");

    let mut writer = &stream;
    let _ = match files.get(path) {
        Some(body) => writer
            .write_all(
                format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                )
                .as_bytes(),
            )
            .and_then(|_| writer.write_all(body)),
        None => writer.write_all(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ),
    };
}

fn small_dims() -> Dims {
    Dims {
        hidden: 256,
        heads: 8,
        kv_heads: 2,
        layers: 2,
        ffn: 512,
        vocab: 1024,
    }
}

#[test]
fn test_remote_single_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m.gguf");
    let model = dense_model("qwen3", small_dims(), "Q4_K");
    write_model_gguf(&path, &model).unwrap();

    let mut files = HashMap::new();
    files.insert("/repo/m.gguf".to_string(), std::fs::read(&path).unwrap());
    let server = FileServer::start(files);

    let loaded = load_model_from(&server.url("/repo/m.gguf")).unwrap();
    assert_eq!(loaded.architecture, "qwen3");
    assert_eq!(loaded.tensors, model.tensors);
}

#[test]
fn test_remote_split_fetches_every_shard() {
    let dir = tempfile::tempdir().unwrap();
    let model = moe_model("qwen3moe", small_dims(), 4, true, "Q8_0");
    let (first, second) = model.tensors.split_at(model.tensors.len() / 2);
    let metadata: Vec<(&str, MetadataValue)> = model
        .metadata
        .iter()
        .map(|(k, v)| (k.as_str(), v.clone()))
        .collect();

    let shard1 = dir.path().join("1.gguf");
    let shard2 = dir.path().join("2.gguf");
    write_gguf(&shard1, &metadata, first).unwrap();
    write_gguf(&shard2, &[("split.no", MetadataValue::UInt(1))], second).unwrap();

    let mut files = HashMap::new();
    files.insert("/r/m-00001-of-00002.gguf".to_string(), std::fs::read(&shard1).unwrap());
    files.insert("/r/m-00002-of-00002.gguf".to_string(), std::fs::read(&shard2).unwrap());
    let server = FileServer::start(files);

    let loaded = RemoteLoader::new()
        .unwrap()
        .load_model(&server.url("/r/m-00002-of-00002.gguf?download=true"))
        .unwrap();
    assert_eq!(loaded.architecture, "qwen3moe");
    assert_eq!(loaded.tensors, model.tensors);
    assert_eq!(
        server.requests(),
        vec![
            "/r/m-00001-of-00002.gguf?download=true",
            "/r/m-00002-of-00002.gguf?download=true",
        ]
    );
}

#[test]
fn test_remote_missing_file() {
    let server = FileServer::start(HashMap::new());
    let err = load_model_from(&server.url("/nope.gguf")).unwrap_err();
    assert!(format!("{:#}", err).contains("404"));
}

#[test]
fn test_remote_body_is_not_gguf() {
    let mut files = HashMap::new();
    files.insert("/m.gguf".to_string(), b"<html>login required</html>".to_vec());
    let server = FileServer::start(files);
    let err = load_model_from(&server.url("/m.gguf")).unwrap_err();
    assert!(format!("{:#}", err).contains("Invalid GGUF magic"));
}

#[test]
fn test_local_paths_still_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("m.gguf");
    let model = dense_model("llama", small_dims(), "Q6_K");
    write_model_gguf(&path, &model).unwrap();

    let loaded = load_model_from(path.to_str().unwrap()).unwrap();
    assert_eq!(loaded.tensors, model.tensors);
}
