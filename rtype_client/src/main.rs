//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p rtype_client -- [--config client.json] [--addr 127.0.0.1:40000] [--name Player]
//!
//! The client joins the server, then reads commands from stdin:
//!   <keys>       - hold keys for one frame (`wasd` to move, space or `f` to fire)
//!   say <text>   - send a chat message
//!   status       - show replica status
//!   quit         - leave the game and exit

use std::env;
use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::Context;
use rtype_client::client::{ClientState, GameClient};
use rtype_client::input::InputState;
use rtype_shared::config::GameConfig;
use tokio::sync::mpsc;
use tracing::info;

fn parse_args() -> anyhow::Result<GameConfig> {
    let args: Vec<String> = env::args().collect();
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => GameConfig::load(&args[i + 1])?,
        _ => GameConfig::default(),
    };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.player_name = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(cfg.tick_hz);
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args().context("load config")?;
    info!(server = %cfg.server_addr, name = %cfg.player_name, "Starting client");

    let mut client = GameClient::connect(&cfg).await.context("connect")?;

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            if console_tx.blocking_send(line.trim_end().to_string()).is_err() {
                break;
            }
        }
    });

    println!("Joined as player {}. Type 'status' for info, 'quit' to exit.", client.player_id);
    println!();

    let frame = cfg.tick_duration();
    let heartbeat_every = cfg.heartbeat_timeout() / 3;
    let mut last_heartbeat = tokio::time::Instant::now();

    loop {
        while let Ok(line) = console_rx.try_recv() {
            let line = line.trim_start();
            if line == "quit" || line == "exit" {
                client.disconnect().await?;
                return Ok(());
            } else if line == "status" {
                let r = &client.replica;
                println!(
                    "State: {:?}, phase: {:?}, players: {}, enemies: {}, projectiles: {}",
                    client.state,
                    r.phase(),
                    r.player_count(),
                    r.enemy_count(),
                    r.projectile_count()
                );
                if let Some(at) = r.local_position() {
                    println!("Ship at ({:.1}, {:.1})", at.x, at.y);
                }
            } else if let Some(text) = line.strip_prefix("say ") {
                client.say(text).await?;
            } else {
                client.send_input(InputState::from_keys(line)).await?;
            }
        }

        if last_heartbeat.elapsed() >= heartbeat_every {
            client.heartbeat().await?;
            last_heartbeat = tokio::time::Instant::now();
        }

        client.poll(Duration::from_millis(1)).await?;
        client.update(frame.as_secs_f32());

        if client.state == ClientState::Disconnected {
            println!("Disconnected from server.");
            break;
        }
        if let Some(score) = client.replica.final_score() {
            println!("Game over. Total score: {score}");
            client.disconnect().await?;
            break;
        }

        tokio::time::sleep(frame).await;
    }

    Ok(())
}
