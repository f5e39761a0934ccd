//! Shared fixtures for integration tests: fake dependencies on loopback ports.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use voiceroi_guard::config::{GuardConfig, Secrets};
use voiceroi_guard::{AppContext, HttpServer};

/// Behaviour of the fake cache for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Pong,
    Error,
    Hang,
}

/// A running guard service bound to an ephemeral port.
pub struct TestService {
    pub addr: SocketAddr,
    pub ctx: Arc<AppContext>,
    shutdown: broadcast::Sender<()>,
}

impl TestService {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestService {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}

/// Embedding payload in the provider's wire shape.
pub fn embedding_body(values: &[f32]) -> String {
    serde_json::json!({ "data": [{ "embedding": values }] }).to_string()
}

/// Start a fake HTTP provider; `f` decides each response's status and body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                if read_http_request(&mut reader).await.is_none() {
                    return;
                }
                let (status, body) = f().await;
                let status_text = match status {
                    200 => "200 OK",
                    401 => "401 Unauthorized",
                    429 => "429 Too Many Requests",
                    500 => "500 Internal Server Error",
                    503 => "503 Service Unavailable",
                    _ => "502 Bad Gateway",
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let mut socket = reader.into_inner();
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a fake provider that sends a 200 header and part of the body, then stalls.
pub async fn start_stalling_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                if read_http_request(&mut reader).await.is_none() {
                    return;
                }
                let mut socket = reader.into_inner();
                let head = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 64\r\nConnection: close\r\n\r\n{\"data\":[";
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_secs(30)).await;
            });
        }
    });

    addr
}

/// Consume one request (headers plus `Content-Length` body).
async fn read_http_request(reader: &mut BufReader<TcpStream>) -> Option<()> {
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().ok()?;
            }
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await.ok()?;
    Some(())
}

/// Start a fake cache; `mode` is consulted once per connection.
pub async fn start_mock_cache<F>(mode: F) -> SocketAddr
where
    F: Fn() -> CacheMode + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let mode = Arc::new(mode);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let mode = mode();
            tokio::spawn(async move {
                let mut reader = BufReader::new(socket);
                // `*1\r\n$4\r\nPING\r\n` arrives as three lines.
                for _ in 0..3 {
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        return;
                    }
                }
                let mut socket = reader.into_inner();
                match mode {
                    CacheMode::Pong => {
                        let _ = socket.write_all(b"+PONG\r\n").await;
                    }
                    CacheMode::Error => {
                        let _ = socket.write_all(b"-LOADING dataset in memory\r\n").await;
                    }
                    CacheMode::Hang => {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                }
            });
        }
    });

    addr
}

/// Configuration pointing at the given fakes, with small breaker thresholds.
pub fn test_config(provider: SocketAddr) -> GuardConfig {
    let mut config = GuardConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.embedding.api_base = format!("http://{provider}/v1");
    config.embedding.request_timeout_secs = 2;
    config.cache.timeout_secs = 1;
    config.breakers.embedding.failure_threshold = 3;
    config.breakers.embedding.reset_timeout_secs = 60;
    config.breakers.redis.failure_threshold = 2;
    config.breakers.redis.reset_timeout_secs = 60;
    config
}

/// Build the context and serve it on an ephemeral port.
pub async fn start_service(config: GuardConfig, cache: SocketAddr) -> TestService {
    let secrets = Secrets {
        api_key: "sk-test".to_string(),
        cache_url: format!("redis://{cache}"),
    };
    let ctx = AppContext::with_secrets(config, secrets, None).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = broadcast::channel(1);

    let server = HttpServer::new(ctx.clone());
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestService {
        addr,
        ctx,
        shutdown: tx,
    }
}
