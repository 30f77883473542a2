use anyhow::Result;
use huddle_server::{RelayState, ServerConfig, router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

/// Starts a relay on an ephemeral port and returns its address together with
/// the state it serves, so tests can look at the room registry.
pub async fn spawn_relay(config: ServerConfig) -> Result<(SocketAddr, RelayState)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = RelayState::new(&config);

    let app = router(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok((addr, state))
}

pub fn small_history(limit: usize) -> ServerConfig {
    ServerConfig {
        chat_history_limit: limit,
        ..ServerConfig::default()
    }
}

/// Polls `check` every 20ms until it holds or the timeout runs out.
pub async fn wait_until<F>(mut check: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
