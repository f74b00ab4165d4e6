//! Shared helpers for the socket-level tests.

use std::time::Duration;

use rtype_client::GameClient;
use rtype_server::bind_ephemeral;
use rtype_shared::{config::GameConfig, packet::Message};
use tokio::task::JoinHandle;

/// Installs a test-writer subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// A server ticking in the background on an ephemeral port.
pub struct RunningServer {
    pub cfg: GameConfig,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl RunningServer {
    pub async fn start(tick_hz: u32) -> anyhow::Result<Self> {
        let (mut server, cfg) = bind_ephemeral(tick_hz).await?;
        let handle = tokio::spawn(async move { server.run().await });
        Ok(Self { cfg, handle })
    }

    /// Client config pointing at this server.
    pub fn client_config(&self, name: &str) -> GameConfig {
        GameConfig {
            player_name: name.to_string(),
            ..self.cfg.clone()
        }
    }

    pub async fn connect(&self, name: &str) -> anyhow::Result<GameClient> {
        GameClient::connect(&self.client_config(name)).await
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Polls `client` until a received message satisfies `pred`, or `timeout`
/// runs out. Returns the matching message.
pub async fn recv_until<F>(
    client: &mut GameClient,
    timeout: Duration,
    mut pred: F,
) -> anyhow::Result<Option<Message>>
where
    F: FnMut(&Message) -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        for packet in client.poll(Duration::from_millis(20)).await? {
            if pred(&packet.message) {
                return Ok(Some(packet.message));
            }
        }
    }
    Ok(None)
}
