//! Fleet loop to membership controller over the local line transport.

mod common;

use common::{FakeDirectory, FakeStreams, RecordingChat, streamer};
use maprelay::fleet::{self, FleetConfig, FleetController, FleetError, PushClient, TransportError};
use maprelay::membership::{ChannelMembershipController, MembershipConfig};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

async fn wait_for_joined(controller: &ChannelMembershipController, expected: &BTreeSet<String>) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if controller.joined().await == *expected {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "joined {:?}, expected {:?}",
            controller.joined().await,
            expected
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_live_channels_are_joined_and_followed() {
    let directory = Arc::new(FakeDirectory::with(vec![
        streamer("1", "alpha", 11),
        streamer("2", "beta", 12),
        streamer("3", "gamma", 13),
    ]));
    let streams = Arc::new(
        FakeStreams::live(&["1", "3"], &[]).with_logins(&[("1", "alpha"), ("2", "beta"), ("3", "gamma")]),
    );
    let chat = Arc::new(RecordingChat::default());
    let controller = Arc::new(ChannelMembershipController::new(
        chat.clone(),
        MembershipConfig {
            join_limit: 20,
            window: Duration::from_secs(10),
            join_timeout: Duration::from_secs(1),
        },
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (desired_tx, desired_rx) = mpsc::channel(8);
    let receiver = tokio::spawn(fleet::serve(listener, Duration::from_secs(2), desired_tx));
    tokio::spawn(Arc::clone(&controller).run(desired_rx));

    let fleet = FleetController::new(
        directory.clone(),
        streams.clone(),
        FleetConfig {
            period: Duration::from_millis(50),
            batch_size: 100,
        },
    );
    let push = PushClient::connect(&address).await.unwrap();
    let poller = tokio::spawn(async move { fleet.run(push).await });

    wait_for_joined(&controller, &set(&["alpha", "gamma"])).await;
    assert!(directory.users.lock().iter().any(|u| u.twitch_id == "1" && u.is_live));

    // alpha goes offline, beta comes online.
    *streams.live_ids.lock() = set(&["2", "3"]);
    wait_for_joined(&controller, &set(&["beta", "gamma"])).await;
    assert!(chat.parts.lock().contains(&"alpha".to_string()));

    // A failing poll keeps the last set flowing instead of emptying it.
    *streams.fail.lock() = true;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(controller.joined().await, set(&["beta", "gamma"]));
    assert!(!receiver.is_finished());

    // gamma renames: the new login is joined and its settings follow.
    *streams.fail.lock() = false;
    streams.logins.lock().insert("3".to_string(), "delta".to_string());
    wait_for_joined(&controller, &set(&["beta", "delta"])).await;
    assert!(chat.parts.lock().contains(&"gamma".to_string()));
    assert!(directory.users.lock().iter().any(|u| u.twitch_id == "3" && u.settings.channel == "delta"));

    poller.abort();
    receiver.abort();
}

#[tokio::test]
async fn test_receiver_stalls_without_pusher() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let (desired_tx, mut desired_rx) = mpsc::channel(8);
    let receiver = tokio::spawn(fleet::serve(listener, Duration::from_millis(300), desired_tx));

    let mut push = PushClient::connect(&address).await.unwrap();
    push.push(&set(&["alpha"])).await.unwrap();
    assert_eq!(desired_rx.recv().await.unwrap(), set(&["alpha"]));

    // Pusher goes quiet; the receiver gives up after the timeout.
    let result = tokio::time::timeout(Duration::from_secs(5), receiver)
        .await
        .expect("receiver should stop")
        .unwrap();
    assert!(matches!(result, Err(TransportError::Stalled(_))));
}

#[tokio::test]
async fn test_push_failure_stops_fleet_loop() {
    let directory = Arc::new(FakeDirectory::with(vec![streamer("1", "alpha", 11)]));
    let streams = Arc::new(FakeStreams::live(&["1"], &[]).with_logins(&[("1", "alpha")]));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let push = PushClient::connect(&address).await.unwrap();
    let (socket, _) = listener.accept().await.unwrap();
    drop(socket);
    drop(listener);

    let fleet = FleetController::new(
        directory,
        streams,
        FleetConfig {
            period: Duration::from_millis(20),
            batch_size: 100,
        },
    );
    let result = tokio::time::timeout(Duration::from_secs(5), fleet.run(push))
        .await
        .expect("fleet loop should stop once the receiver is gone");
    assert!(matches!(result, Err(FleetError::Push(_))), "{result:?}");
}
