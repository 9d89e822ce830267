use masternode_coordinator::*;
use std::sync::Arc;
use std::time::Duration;

const SELF_ID: MasternodeId = MasternodeId::from_bytes([0xaa; 32]);

fn config() -> MasternodeConfig {
    MasternodeConfig::new(SELF_ID, "10.0.0.1:30303".parse().unwrap())
}

fn join(byte: u8, endpoint: &str, height: u64) -> ChainEvent {
    ChainEvent::Join(JoinEvent {
        id: MasternodeId::from_bytes([byte; 32]),
        endpoint: endpoint.parse().unwrap(),
        join_height: height,
        protocol_version: 1,
    })
}

fn quit(byte: u8) -> ChainEvent {
    ChainEvent::Quit(QuitEvent {
        id: MasternodeId::from_bytes([byte; 32]),
    })
}

async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_join_quit_lifecycle() {
    let manager = MasternodeManager::new(config(), Arc::new(LoggingPeerConnector));
    let (source, feed) = ChannelEventSource::new(16);
    let handle = manager.start(Arc::new(source));

    feed.send(join(1, "10.0.0.2:30303", 10)).await.unwrap();
    wait_for(|| manager.registry().size() == 1).await;
    let before = manager.registry().size();

    feed.send(join(2, "10.0.0.3:30303", 11)).await.unwrap();
    feed.send(quit(2)).await.unwrap();
    handle.shutdown().await.unwrap();

    assert_eq!(manager.registry().size(), before);
    assert!(manager.registry().lookup(&MasternodeId::from_bytes([2; 32])).is_none());
}

#[tokio::test]
async fn test_replayed_log_applies_in_order() {
    let line = |kind: &str, byte: u8, rest: &str| {
        format!(r#"{{"type":"{}","id":"{}"{}}}"#, kind, hex::encode([byte; 32]), rest)
    };
    let log = [
        "# contract log".to_string(),
        line("join", 1, r#","endpoint":"10.0.0.2:30303","join_height":10"#),
        line("join", 0xaa, r#","endpoint":"10.0.0.1:30303","join_height":11"#),
        line("quit", 1, ""),
        line("join", 2, r#","endpoint":"10.0.0.3:30303","join_height":12"#),
        line("quit", 0xaa, ""),
        line("join", 1, r#","endpoint":"10.0.0.4:30303","join_height":13"#),
        line("quit", 2, ""),
        line("join", 0xaa, r#","endpoint":"10.0.0.1:30303","join_height":14"#),
    ]
    .join("\n");
    let events = parse_event_lines(&log).unwrap();
    assert_eq!(events.len(), 8);

    let manager = MasternodeManager::new(config(), Arc::new(LoggingPeerConnector));
    let (source, feed) = ChannelEventSource::new(events.len());
    let handle = manager.start(Arc::new(source));
    for event in events {
        feed.send(event).await.unwrap();
    }
    handle.shutdown().await.unwrap();

    let registry = manager.registry();
    assert_eq!(registry.size(), 2);
    assert!(registry.lookup(&MasternodeId::from_bytes([2; 32])).is_none());
    let rejoined = registry.lookup(&MasternodeId::from_bytes([1; 32])).unwrap();
    assert_eq!(rejoined.join_height, 13);
    assert_eq!(rejoined.endpoint.to_string(), "10.0.0.4:30303");
    assert_eq!(registry.lookup(&SELF_ID).map(|r| r.join_height), Some(14));
    assert_eq!(manager.active_state(), ActiveState::Started);
}

#[tokio::test]
async fn test_rejoin_replaces_record() {
    let manager = MasternodeManager::new(config(), Arc::new(LoggingPeerConnector));
    let (source, feed) = ChannelEventSource::new(16);
    let handle = manager.start(Arc::new(source));

    feed.send(join(1, "10.0.0.2:30303", 10)).await.unwrap();
    feed.send(join(1, "10.0.0.9:30404", 50)).await.unwrap();
    handle.shutdown().await.unwrap();

    assert_eq!(manager.registry().size(), 1);
    let record = manager.registry().lookup(&MasternodeId::from_bytes([1; 32])).unwrap();
    assert_eq!(record.endpoint.to_string(), "10.0.0.9:30404");
    assert_eq!(record.join_height, 50);
}

#[tokio::test]
async fn test_local_node_lifecycle() {
    let manager = MasternodeManager::new(config(), Arc::new(LoggingPeerConnector));
    let (source, feed) = ChannelEventSource::new(16);
    let handle = manager.start(Arc::new(source));

    feed.send(join(0xaa, "10.0.0.1:30303", 3)).await.unwrap();
    wait_for(|| manager.active_state() == ActiveState::Started).await;

    // Re-registered on another port: no longer eligible
    feed.send(join(0xaa, "10.0.0.1:30304", 4)).await.unwrap();
    wait_for(|| manager.active_state() == ActiveState::NotCapable).await;

    feed.send(join(0xaa, "10.0.0.1:30303", 5)).await.unwrap();
    wait_for(|| manager.active_state() == ActiveState::Started).await;

    feed.send(quit(0xaa)).await.unwrap();
    handle.shutdown().await.unwrap();
    assert_eq!(manager.active_state(), ActiveState::NotCapable);
}

#[tokio::test]
async fn test_payment_and_quorum_over_live_registry() {
    let manager = MasternodeManager::new(config(), Arc::new(LoggingPeerConnector));
    let (source, feed) = ChannelEventSource::new(64);
    let handle = manager.start(Arc::new(source));

    feed.send(join(0xaa, "10.0.0.1:30303", 500)).await.unwrap();
    for b in 1..=29u8 {
        feed.send(join(b, &format!("10.0.1.{}:30303", b), b as u64 * 10)).await.unwrap();
    }
    handle.shutdown().await.unwrap();
    assert_eq!(manager.registry().size(), 30);

    // 30 masternodes: the three most senior (heights 10, 20, 30) compete
    let senior = [1u8, 2, 3].map(|b| MasternodeId::from_bytes([b; 32]));
    for seed in 0..16u8 {
        let block = BlockHash::from_bytes([seed; 32]);
        let winner = manager.next_masternode_for_payment(&block).unwrap();
        assert!(senior.contains(&winner.id));

        let vote = PaymentVote {
            voter: MasternodeId::from_bytes([7; 32]),
            block_hash: block,
            payee: winner.id,
        };
        assert!(manager.accept_payment_vote(&vote));
    }

    let block = BlockHash::from_bytes([0x3c; 32]);
    let ranking = manager.masternode_scores(&block);
    assert_eq!(ranking.len(), 30);

    let lock_vote = |entry: &RankedEntry| LockVote {
        voter: entry.record.id,
        block_hash: block,
        tx_hash: BlockHash::from_bytes([0xee; 32]),
    };
    assert!(manager.accept_lock_vote(&lock_vote(&ranking[9])));
    assert!(!manager.accept_lock_vote(&lock_vote(&ranking[10])));

    let local_rank = manager.masternode_rank(&SELF_ID, &block).unwrap();
    assert_eq!(manager.can_vote_tx_lock(&block).authorized, local_rank <= 10);
}

#[tokio::test]
async fn test_stream_failure_ends_loop() {
    let manager = MasternodeManager::new(config(), Arc::new(LoggingPeerConnector));
    let (source, feed) = ChannelEventSource::new(16);
    let handle = manager.start(Arc::new(source));

    feed.join.fail("subscription dropped").await.unwrap();
    let result = handle.join().await;

    assert!(matches!(result, Err(MasternodeError::StreamFailure { .. })));
    assert!(feed.join.is_closed());
    assert!(feed.send(join(1, "10.0.0.2:30303", 1)).await.is_err());
}

#[test]
fn test_remove_peer_disconnects() {
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        dropped: Mutex<Vec<(MasternodeId, DisconnectReason)>>,
    }

    impl PeerConnector for Recorder {
        fn connect_peer(&self, _endpoint: &NetworkEndpoint) {}

        fn disconnect_peer(&self, id: &MasternodeId, reason: DisconnectReason) {
            self.dropped.lock().push((*id, reason));
        }
    }

    let recorder = Arc::new(Recorder::default());
    let manager = MasternodeManager::new(config(), recorder.clone());
    manager.remove_peer(&MasternodeId::from_bytes([4; 32]));

    assert_eq!(
        *recorder.dropped.lock(),
        vec![(MasternodeId::from_bytes([4; 32]), DisconnectReason::UselessPeer)]
    );
}
