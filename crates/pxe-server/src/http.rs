//! HTTP server for iPXE boot.
//!
//! Serves the HTTP root as static files; chainloaded iPXE fetches its boot
//! script and images from here. Every request is access-logged as
//! `METHOD PATH - STATUS - REMOTE_ADDR`.

use crate::config::HttpConfig;
use crate::error::PxeError;
use crate::shutdown::Closing;
use axum::Router;
use axum::extract::{ConnectInfo, Request};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Static file server for iPXE scripts and images.
pub struct HttpServer {
    listen: SocketAddr,
    root: PathBuf,
    closing: Closing,
}

impl HttpServer {
    /// Creates a new HTTP server instance serving `config.root_dir`.
    pub fn new(config: &HttpConfig) -> Self {
        Self {
            listen: config.listen,
            root: config.root_dir.clone(),
            closing: Closing::new(),
        }
    }

    /// Binds the configured address and serves until `shutdown`.
    pub async fn start(&self) -> Result<(), PxeError> {
        let listener = TcpListener::bind(self.listen)
            .await
            .map_err(|source| PxeError::Bind {
                service: "http",
                addr: self.listen,
                source,
            })?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener until `shutdown`, then lets
    /// in-flight requests finish.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), PxeError> {
        info!(addr = %listener.local_addr()?, root = %self.root.display(), "Starting HTTP server");

        let closing = self.closing.clone();
        axum::serve(
            listener,
            router(&self.root).into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { closing.closed().await })
        .await
        .map_err(|e| PxeError::Http(e.to_string()))?;

        info!("HTTP server stopped");
        Ok(())
    }

    pub fn shutdown(&self) {
        if self.closing.close() {
            debug!("HTTP server closing");
        }
    }
}

/// Static file router over `root`.
pub fn router(root: &Path) -> Router {
    Router::new()
        .fallback_service(ServeDir::new(root))
        .layer(middleware::from_fn(access_log))
        .layer(TraceLayer::new_for_http())
}

async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "-".to_string(), |ConnectInfo(addr)| addr.to_string());

    let response = next.run(request).await;
    info!("{}", access_log_line(&method, &path, response.status(), &remote));
    response
}

pub fn access_log_line(method: &Method, path: &str, status: StatusCode, remote: &str) -> String {
    format!("{method} {path} - {} - {remote}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    fn boot_root() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("boot.ipxe"), "#!ipxe\nchain http://10.0.0.1/menu.ipxe\n").unwrap();
        dir
    }

    async fn get(root: &Path, uri: &str) -> Response {
        router(root)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[test]
    fn test_access_log_line() {
        assert_eq!(
            access_log_line(&Method::GET, "/boot.ipxe", StatusCode::OK, "10.0.0.5:40212"),
            "GET /boot.ipxe - 200 - 10.0.0.5:40212"
        );
    }

    #[tokio::test]
    async fn test_serves_boot_script() {
        let dir = boot_root();
        let response = get(dir.path(), "/boot.ipxe").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"#!ipxe\n"));
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let dir = boot_root();
        assert_eq!(get(dir.path(), "/vmlinuz").await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_parent_segments_do_not_escape_root() {
        let outer = TempDir::new().unwrap();
        std::fs::write(outer.path().join("secret"), "nope").unwrap();
        let root = outer.path().join("http");
        std::fs::create_dir(&root).unwrap();

        let response = get(&root, "/../secret").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_and_shutdown() {
        let dir = boot_root();
        let config = HttpConfig {
            enabled: true,
            listen: "127.0.0.1:0".parse().unwrap(),
            root_dir: dir.path().to_path_buf(),
        };
        let server = std::sync::Arc::new(HttpServer::new(&config));
        let listener = TcpListener::bind(config.listen).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = {
            let server = server.clone();
            tokio::spawn(async move { server.serve(listener).await })
        };

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /boot.ipxe HTTP/1.1\r\nHost: pxe\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("chain http://10.0.0.1/menu.ipxe\n"));

        server.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
