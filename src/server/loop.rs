// Server loop module
// Accepts connections until shutdown, then drains in-flight connections

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::signal::SignalHandler;
use crate::config::AppState;
use crate::logger;

/// How often the drain phase re-checks the connection counter
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accept loop for the application listener
///
/// Returns once shutdown was requested and active connections drained
/// (or `performance.shutdown_grace` elapsed).
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    signals: Arc<SignalHandler>,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));

    // Created before the loop so a notification during accept handling is not lost
    let shutdown = signals.shutdown.notified();
    tokio::pin!(shutdown);

    if !signals.is_shutdown_requested() {
        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            accept_connection(
                                stream,
                                peer_addr,
                                &state,
                                &active_connections,
                                &signals,
                            );
                        }
                        Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                    }
                }
                () = &mut shutdown => break,
            }
        }
    }

    drop(listener);
    let grace = Duration::from_secs(state.config.performance.shutdown_grace);
    drain_connections(&active_connections, grace).await;
}

/// Wait until no connection is active or `grace` elapses
async fn drain_connections(active_connections: &AtomicUsize, grace: Duration) {
    logger::log_shutdown_started(active_connections.load(Ordering::SeqCst));

    let deadline = tokio::time::Instant::now() + grace;
    while active_connections.load(Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() >= deadline {
            logger::log_warning(&format!(
                "Shutdown grace period elapsed with {} connections still open",
                active_connections.load(Ordering::SeqCst)
            ));
            break;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }

    logger::log_shutdown_complete();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ServiceVariant};
    use crate::handler::templates::TemplateStore;
    use crate::server::create_reusable_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_drain_returns_when_idle() {
        let counter = AtomicUsize::new(0);
        drain_connections(&counter, Duration::from_secs(5)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_grace() {
        let counter = AtomicUsize::new(1);
        let started = tokio::time::Instant::now();
        drain_connections(&counter, Duration::from_millis(100)).await;
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_serves_over_tcp_and_stops_on_shutdown() {
        let mut config = Config::load_from("tests/no-such-config-file").unwrap();
        config.service.variant = ServiceVariant::Canary;
        config.logging.access_log = false;
        let state = Arc::new(AppState::new(
            config,
            TemplateStore::from_sources(Vec::new()).unwrap(),
        ));

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let signals = Arc::new(SignalHandler::new());
        let server = tokio::spawn(start_server_loop(listener, state, Arc::clone(&signals)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.ends_with("This is the canary version"));

        signals.request_shutdown();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_closes_idle_keep_alive_connection() {
        let mut config = Config::load_from("tests/no-such-config-file").unwrap();
        config.service.variant = ServiceVariant::Canary;
        config.logging.access_log = false;
        config.performance.shutdown_grace = 5;
        let state = Arc::new(AppState::new(
            config,
            TemplateStore::from_sources(Vec::new()).unwrap(),
        ));

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let signals = Arc::new(SignalHandler::new());
        let server = tokio::spawn(start_server_loop(listener, state, Arc::clone(&signals)));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        while !raw.ends_with(b"This is the canary version") {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the response body");
            raw.extend_from_slice(&chunk[..n]);
        }

        // connection stays open and idle
        let started = tokio::time::Instant::now();
        signals.request_shutdown();
        server.await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(stream.read(&mut chunk).await.unwrap(), 0);
    }
}
