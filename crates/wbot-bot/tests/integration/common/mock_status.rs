//! Mock status endpoint for integration tests.
//!
//! Serves the configured dependency list as a status response body.
//! The list can be changed while the server runs.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use wbot_health::{DependencyStatus, HealthReport};

/// A mock status server for testing.
pub struct MockStatusServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    endpoints: Arc<Mutex<Vec<(String, bool)>>>,
    requests: Arc<Mutex<u32>>,
}

impl MockStatusServer {
    /// Start a server reporting `names` as active.
    pub async fn start(names: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let endpoints = Arc::new(Mutex::new(
            names.iter().map(|n| (n.to_string(), true)).collect::<Vec<_>>(),
        ));
        let requests = Arc::new(Mutex::new(0u32));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let endpoints_clone = endpoints.clone();
        let requests_clone = requests.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        let endpoints = endpoints_clone.clone();
                        let requests = requests_clone.clone();
                        tokio::spawn(handle_connection(stream, endpoints, requests));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            endpoints,
            requests,
        }
    }

    /// Status endpoint URL.
    pub fn url(&self) -> String {
        format!("http://{}/api/status", self.addr)
    }

    /// Mark one dependency up or down.
    pub async fn set_active(&self, name: &str, active: bool) {
        let mut endpoints = self.endpoints.lock().await;
        if let Some(entry) = endpoints.iter_mut().find(|(n, _)| n == name) {
            entry.1 = active;
        }
    }

    /// Number of requests served.
    pub async fn request_count(&self) -> u32 {
        *self.requests.lock().await
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    endpoints: Arc<Mutex<Vec<(String, bool)>>>,
    requests: Arc<Mutex<u32>>,
) {
    // Read the request head; the body of a GET is empty.
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
    *requests.lock().await += 1;

    let statuses: Vec<(String, DependencyStatus)> = endpoints
        .lock()
        .await
        .iter()
        .map(|(name, up)| {
            let status = if *up {
                DependencyStatus::Active
            } else {
                DependencyStatus::Inactive
            };
            (name.clone(), status)
        })
        .collect();
    let report = HealthReport::from_statuses(statuses, 1_700_000_000_000);
    let response = report.to_response();
    let body = serde_json::to_string(&response).unwrap();

    let reply = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = stream.write_all(reply.as_bytes()).await;
    let _ = stream.shutdown().await;
}
