//! Election solicitation, egress limiting and channel bookkeeping.

use bl_02_transport::{BandwidthLimiter, ChannelDirectory, DropPolicy};
use bl_03_confirmation_solicitor::{
    ConfirmationSolicitor, ElectionView, FloodNetwork, MessageSink, Representative,
    SolicitorConfig,
};
use bl_04_distributed_work::{DistributedWorkManager, WorkRequest};
use parking_lot::Mutex;
use shared_types::{
    Account, Block, BlockHash, KeyPair, Message, ReceiveBlock, Root, CONFIRM_REQ_HASHES_MAX,
};
use std::sync::Arc;

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<Message>>,
}

impl MessageSink for RecordingSink {
    fn send(&self, message: &Message) {
        self.sent.lock().push(message.clone());
    }
}

/// Network fake that consults a bandwidth limiter the way the real flood
/// path does.
struct LimitedNetwork {
    limiter: BandwidthLimiter,
    flooded: Mutex<Vec<Message>>,
    dropped: Mutex<usize>,
}

impl LimitedNetwork {
    fn new(limit: usize) -> Self {
        Self {
            limiter: BandwidthLimiter::new(limit),
            flooded: Mutex::new(Vec::new()),
            dropped: Mutex::new(0),
        }
    }
}

impl FloodNetwork for LimitedNetwork {
    fn flood_message(&self, message: &Message, _include_local: bool, _fanout: f32) {
        let size = message.to_bytes().len();
        if self.limiter.should_drop(size) {
            *self.dropped.lock() += 1;
        } else {
            self.flooded.lock().push(message.clone());
        }
    }
}

fn election_for(seed: u8) -> (ElectionView, Arc<Block>) {
    let key = KeyPair::from_seed([seed; 32]);
    let block = Arc::new(Block::Receive(ReceiveBlock::new(
        BlockHash([seed; 32]),
        BlockHash([seed.wrapping_add(1); 32]),
        &key,
        0,
    )));
    (ElectionView::new(block.clone(), Vec::new()), block)
}

#[test]
fn solicitation_cycle_batches_and_broadcasts() {
    let network = Arc::new(LimitedNetwork::new(0));
    let sink = Arc::new(RecordingSink::default());
    let representative =
        Representative::new(Account([1; 32]), sink.clone() as Arc<dyn MessageSink>);
    let mut solicitor =
        ConfirmationSolicitor::new(network.clone(), SolicitorConfig::mainnet());

    solicitor.prepare(vec![representative]).unwrap();
    let (view, block) = election_for(10);
    solicitor.broadcast(&view).unwrap();
    for seed in 0..9u8 {
        let (view, _) = election_for(seed);
        solicitor.add(&view).unwrap();
    }
    solicitor.flush().unwrap();

    let sent = sink.sent.lock();
    // One direct publish plus two confirm-req batches (seven + two)
    assert_eq!(sent.len(), 3);
    match &sent[0] {
        Message::Publish(published) => assert_eq!(published.hash(), block.hash()),
        other => panic!("expected the winner publish first, got {other:?}"),
    }
    match (&sent[1], &sent[2]) {
        (Message::ConfirmReq(first), Message::ConfirmReq(second)) => {
            assert_eq!(first.len(), CONFIRM_REQ_HASHES_MAX);
            assert_eq!(second.len(), 2);
        }
        other => panic!("expected batched confirm requests, got {other:?}"),
    }
    assert_eq!(network.flooded.lock().len(), 1, "the winner must also flood");
}

#[test]
fn flood_respects_the_bandwidth_limiter() {
    // A limit small enough that a publish exceeds the per-period share
    let network = Arc::new(LimitedNetwork::new(100));
    let sink = Arc::new(RecordingSink::default());
    let representative =
        Representative::new(Account([1; 32]), sink.clone() as Arc<dyn MessageSink>);
    let mut solicitor = ConfirmationSolicitor::new(network.clone(), SolicitorConfig::test());
    solicitor.prepare(vec![representative]).unwrap();
    let (view, _) = election_for(20);
    solicitor.broadcast(&view).unwrap();
    solicitor.flush().unwrap();
    assert_eq!(*network.dropped.lock(), 1, "oversized flood must be dropped");
    assert!(network.flooded.lock().is_empty());
}

#[test]
fn oversized_messages_always_drop() {
    let limiter = BandwidthLimiter::new(1000);
    assert!(limiter.should_drop(51), "any message above limit/20 must drop");
    let unlimited = BandwidthLimiter::new(0);
    assert!(!unlimited.should_drop(usize::MAX));
}

#[test]
fn keepalive_handshake_replaces_the_stale_channel() {
    let directory = ChannelDirectory::new();
    let node_id = Account([7; 32]);
    let wrong: std::net::SocketAddr = "127.0.0.1:9001".parse().unwrap();
    let correct: std::net::SocketAddr = "127.0.0.1:9002".parse().unwrap();

    // A channel recorded at a wrong endpoint, attributed to the peer
    directory.insert(wrong);
    directory.modify(&wrong, |channel| channel.set_node_id(node_id));
    assert_eq!(directory.len(), 1);

    // The keepalive response arrives from the peer's real endpoint and the
    // handshake attributes the same node id there
    directory.insert(correct);
    directory.modify(&correct, |channel| channel.set_node_id(node_id));

    assert!(directory.channel(&wrong).is_none());
    assert!(directory.channel(&correct).is_some());
    assert_eq!(directory.len(), 1, "replacement must keep the channel count stable");
}

#[test]
fn cancelled_work_leaves_no_jobs_behind() {
    let manager = DistributedWorkManager::new(true);
    let root = Root([5; 32]);
    for _ in 0..5 {
        manager.make(WorkRequest::new(root, u64::MAX)).unwrap();
    }
    assert_eq!(manager.size(), 5);
    manager.cancel(&root);
    assert_eq!(manager.size(), 0);
    manager.stop();
}

#[test]
fn drop_policy_bypasses_the_limiter_for_essential_traffic() {
    let limiter = BandwidthLimiter::new(100);
    let message_size = 512;
    // The flood path only consults the limiter for best-effort traffic
    let policy = DropPolicy::NoLimiterDrop;
    let dropped = policy == DropPolicy::Limiter && limiter.should_drop(message_size);
    assert!(!dropped, "essential traffic must never be limiter-dropped");
}
