//! Full socket-based integration tests for client ↔ server communication.

use std::time::Duration;

use rtype_client::input::InputState;
use rtype_shared::packet::{
    ChatMessage, EnemyMove, Fixed, Message, NewPlayer, Packet, PlayerDisconnect, ProjectileSpawn,
};
use rtype_tests::{init_tracing, recv_until, RunningServer};
use tokio::net::UdpSocket;

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn join_assigns_id_and_starts_game() -> anyhow::Result<()> {
    init_tracing();
    let server = RunningServer::start(60).await?;
    let mut client = server.connect("ripley").await?;
    assert_eq!(client.player_id, 1);

    let started = recv_until(&mut client, WAIT, |m| matches!(m, Message::GameStart(_))).await?;
    assert!(started.is_some(), "expected GameStart");
    assert!(client.replica.local_position().is_some());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn late_joiner_sees_existing_player() -> anyhow::Result<()> {
    init_tracing();
    let server = RunningServer::start(60).await?;
    let mut first = server.connect("a").await?;
    let mut second = server.connect("b").await?;
    let (a, b) = (first.player_id, second.player_id);
    assert_ne!(a, b);

    let seen = recv_until(&mut second, WAIT, |m| {
        matches!(m, Message::NewPlayer(NewPlayer { player_id, .. }) if *player_id == a)
    })
    .await?;
    assert!(seen.is_some() || second.replica.player(a).is_some());

    let announced = recv_until(&mut first, WAIT, |m| {
        matches!(m, Message::NewPlayer(NewPlayer { player_id, .. }) if *player_id == b)
    })
    .await?;
    assert!(announced.is_some(), "first client never heard of the second");
    assert_eq!(first.replica.player_count(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fire_spawns_projectile_owned_by_shooter() -> anyhow::Result<()> {
    init_tracing();
    let server = RunningServer::start(60).await?;
    let mut client = server.connect("shooter").await?;
    let me = client.player_id;

    client.send_input(InputState::FIRE).await?;
    let spawn = recv_until(&mut client, WAIT, |m| matches!(m, Message::ProjectileSpawn(_))).await?;
    match spawn {
        Some(Message::ProjectileSpawn(ProjectileSpawn {
            owner_id, hostile, ..
        })) => {
            assert_eq!(owner_id, me);
            assert!(!hostile);
        }
        other => anyhow::bail!("expected ProjectileSpawn, got {other:?}"),
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chat_is_relayed_with_sender_id() -> anyhow::Result<()> {
    init_tracing();
    let server = RunningServer::start(60).await?;
    let mut alice = server.connect("alice").await?;
    let mut bob = server.connect("bob").await?;

    alice.say("hello").await?;
    let got = recv_until(&mut bob, WAIT, |m| matches!(m, Message::ChatMessage(_))).await?;
    match got {
        Some(Message::ChatMessage(ChatMessage {
            player_id, text, ..
        })) => {
            assert_eq!(player_id, alice.player_id);
            assert_eq!(text.as_str(), "hello");
        }
        other => anyhow::bail!("expected ChatMessage, got {other:?}"),
    }
    assert_eq!(bob.replica.chat().len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_is_broadcast() -> anyhow::Result<()> {
    init_tracing();
    let server = RunningServer::start(60).await?;
    let mut leaver = server.connect("leaver").await?;
    let mut stayer = server.connect("stayer").await?;
    let gone = leaver.player_id;

    leaver.disconnect().await?;
    let got = recv_until(&mut stayer, WAIT, |m| {
        matches!(m, Message::PlayerDisconnect(PlayerDisconnect { player_id }) if *player_id == gone)
    })
    .await?;
    assert!(got.is_some(), "expected PlayerDisconnect for {gone}");
    assert!(stayer.replica.player(gone).is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn garbage_does_not_disturb_the_server() -> anyhow::Result<()> {
    init_tracing();
    let server = RunningServer::start(60).await?;
    let raw = UdpSocket::bind("127.0.0.1:0").await?;
    raw.connect(server.cfg.server_addr.as_str()).await?;

    raw.send(&[0xAB; 3]).await?;
    raw.send(&[0x04, 0, 0, 40, 0, 0, 0, 0]).await?;
    let wrong_direction = Packet::from(Message::EnemyMove(EnemyMove {
        enemy_id: 1,
        x: Fixed(0),
        y: Fixed(0),
        vx: Fixed(0),
        vy: Fixed(0),
    }));
    raw.send(&wrong_direction.encode()).await?;

    let mut buf = [0u8; 64];
    let reply = tokio::time::timeout(Duration::from_millis(200), raw.recv(&mut buf)).await;
    assert!(reply.is_err(), "server answered a rejected packet");

    let client = server.connect("after").await?;
    assert_eq!(client.player_id, 1);
    Ok(())
}
