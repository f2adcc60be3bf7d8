//! End-to-end ingestion flows: filter → processor → ledger, with the
//! recording fakes observing every outward effect.

use crate::fixtures::NodeHarness;
use bl_05_block_processor::Ledger as _;
use shared_types::{Account, Block, KeyPair, OpenBlock, UncheckedInfo, VerifyStatus, GENESIS_AMOUNT};
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[test]
fn live_publish_is_processed_once() {
    let harness = NodeHarness::new();
    let destination = KeyPair::from_seed([0x31; 32]).account();
    let send = harness.send_from_genesis(harness.genesis.hash(), destination, GENESIS_AMOUNT - 5);

    assert!(harness.ingest_publish(send.clone()), "first publish must pass the filter");
    assert!(
        !harness.ingest_publish(send.clone()),
        "replayed publish must be dropped before the processor"
    );
    harness.processor.flush();

    assert!(harness.block_exists(&send.hash()));
    assert_eq!(
        harness.stats.count(
            bl_05_block_processor::StatCategory::Ledger,
            bl_05_block_processor::StatDetail::Old
        ),
        0,
        "the duplicate must never have reached the ledger"
    );
    assert_eq!(harness.elections.inserted.lock().len(), 1);
    harness.stop();
}

#[test]
fn live_block_notifies_websocket_subscribers() {
    let harness = NodeHarness::new();
    *harness.websocket.subscribed.lock() = true;
    let destination = KeyPair::from_seed([0x31; 32]).account();
    let send = harness.send_from_genesis(harness.genesis.hash(), destination, GENESIS_AMOUNT - 5);
    harness.ingest_publish(send.clone());
    harness.processor.flush();
    assert_eq!(
        harness.websocket.broadcasts.lock().as_slice(),
        &[send.hash()],
        "subscribed websocket must see the new unconfirmed block"
    );
    harness.stop();
}

#[test]
fn gap_previous_resolves_when_the_parent_arrives() {
    let harness = NodeHarness::new();
    let destination = KeyPair::from_seed([0x31; 32]).account();
    let send1 =
        harness.send_from_genesis(harness.genesis.hash(), destination, GENESIS_AMOUNT - 100);
    let send2 = harness.send_from_genesis(send1.hash(), destination, GENESIS_AMOUNT - 200);
    let unchecked_before = harness.ledger.cache().unchecked_count.load(Ordering::Relaxed);

    // The child arrives ahead of its parent
    harness.ingest_publish(send2.clone());
    harness.processor.flush();
    assert!(!harness.block_exists(&send2.hash()));
    assert!(harness.gap_cache.contains(&send2.hash()));
    assert_eq!(
        harness.ledger.cache().unchecked_count.load(Ordering::Relaxed),
        unchecked_before + 1
    );

    harness.ingest_publish(send1.clone());
    harness.processor.flush();
    assert!(harness.block_exists(&send1.hash()));
    assert!(harness.block_exists(&send2.hash()), "dependent must drain from unchecked");
    assert_eq!(
        harness.ledger.cache().unchecked_count.load(Ordering::Relaxed),
        unchecked_before,
        "unchecked count must return to its pre-test value"
    );
    assert!(
        !harness.gap_cache.contains(&send2.hash()),
        "gap cache must forget a drained dependent"
    );
    harness.stop();
}

#[test]
fn forced_replacement_evicts_the_standing_block() {
    let harness = NodeHarness::new();
    let key1 = KeyPair::from_seed([0x31; 32]);
    let rep1 = KeyPair::from_seed([0x32; 32]);
    let rep2 = KeyPair::from_seed([0x33; 32]);
    let send =
        harness.send_from_genesis(harness.genesis.hash(), key1.account(), GENESIS_AMOUNT - 50);
    let open1 = Arc::new(Block::Open(OpenBlock::new(
        send.hash(),
        rep1.account(),
        key1.account(),
        &key1,
        0,
    )));
    let open2 = Arc::new(Block::Open(OpenBlock::new(
        send.hash(),
        rep2.account(),
        key1.account(),
        &key1,
        0,
    )));

    harness.ingest_publish(send);
    harness.ingest_publish(open1.clone());
    harness.processor.flush();
    assert!(harness.block_exists(&open1.hash()));

    // The election settled on the sibling: force it in
    harness.processor.force(open2.clone());
    harness.processor.flush();

    assert!(!harness.block_exists(&open1.hash()));
    assert!(harness.block_exists(&open2.hash()));
    assert!(
        harness.votes_cache.removed.lock().contains(&open1.hash()),
        "rolled-back block must be evicted from the votes cache"
    );
    harness.stop();
}

#[test]
fn conflicting_publish_reaches_the_fork_handler() {
    let harness = NodeHarness::new();
    let key1 = KeyPair::from_seed([0x31; 32]);
    let rep1 = KeyPair::from_seed([0x32; 32]);
    let rep2 = KeyPair::from_seed([0x33; 32]);
    let send =
        harness.send_from_genesis(harness.genesis.hash(), key1.account(), GENESIS_AMOUNT - 50);
    let open1 = Arc::new(Block::Open(OpenBlock::new(
        send.hash(),
        rep1.account(),
        key1.account(),
        &key1,
        0,
    )));
    let open2 = Arc::new(Block::Open(OpenBlock::new(
        send.hash(),
        rep2.account(),
        key1.account(),
        &key1,
        0,
    )));

    harness.ingest_publish(send);
    harness.ingest_publish(open1.clone());
    harness.processor.flush();
    harness.ingest_publish(open2.clone());
    harness.processor.flush();

    assert!(harness.block_exists(&open1.hash()), "the first open must stand");
    assert!(!harness.block_exists(&open2.hash()));
    assert_eq!(
        harness.fork_handler.forks.lock().as_slice(),
        &[open2.hash()],
        "the conflicting sibling must be handed to fork resolution"
    );
    harness.stop();
}

#[test]
fn stale_ingest_skips_elections_and_floods() {
    let harness = NodeHarness::new();
    let destination = KeyPair::from_seed([0x31; 32]).account();
    let send = harness.send_from_genesis(harness.genesis.hash(), destination, GENESIS_AMOUNT - 5);
    harness.ingest_stale(send.clone());
    harness.processor.flush();
    assert!(harness.block_exists(&send.hash()));
    assert!(harness.elections.inserted.lock().is_empty());
    assert!(harness.network.floods.lock().is_empty());
    assert!(harness.network.initial_floods.lock().is_empty());
    harness.stop();
}

#[test]
fn processor_reports_backpressure_thresholds() {
    let mut config = bl_05_block_processor::ProcessorConfig::default();
    config.block_processor_full_size = 4;
    let harness = NodeHarness::with_config(config);

    // Hold the write gate so queued blocks accumulate
    let gate = harness.write_queue.wait(bl_05_block_processor::Writer::Testing);
    let destination = KeyPair::from_seed([0x31; 32]).account();
    let mut previous = harness.genesis.hash();
    for index in 0..4u128 {
        let send =
            harness.send_from_genesis(previous, destination, GENESIS_AMOUNT - (index + 1));
        previous = send.hash();
        harness.ingest_stale(send);
    }
    assert!(harness.processor.half_full());
    assert!(harness.processor.full());
    drop(gate);
    harness.processor.flush();
    assert!(!harness.processor.full());
    harness.stop();
}

#[test]
fn repeated_submission_is_idempotent() {
    let harness = NodeHarness::new();
    let destination = KeyPair::from_seed([0x31; 32]).account();
    let send = harness.send_from_genesis(harness.genesis.hash(), destination, GENESIS_AMOUNT - 5);
    for _ in 0..3 {
        harness.ingest_stale(send.clone());
        harness.processor.flush();
    }
    assert!(harness.block_exists(&send.hash()));
    assert_eq!(
        harness.stats.count(
            bl_05_block_processor::StatCategory::Ledger,
            bl_05_block_processor::StatDetail::Old
        ),
        2,
        "re-submissions past the first must land as old"
    );
    harness.stop();
}

#[test]
fn add_after_unchecked_prefers_the_front_of_the_queue() {
    // Direct check of the admission contract: the front-insert preference
    // is honored only while the processor is under a quarter full
    let harness = NodeHarness::new();
    let destination = KeyPair::from_seed([0x31; 32]).account();
    let gate = harness.write_queue.wait(bl_05_block_processor::Writer::Testing);
    let back = harness.send_from_genesis(harness.genesis.hash(), destination, GENESIS_AMOUNT - 1);
    let front =
        harness.send_from_genesis(harness.genesis.hash(), destination, GENESIS_AMOUNT - 2);
    harness.processor.add(
        UncheckedInfo::new(back, Account::ZERO, VerifyStatus::Unknown),
        false,
    );
    harness.processor.add(
        UncheckedInfo::new(front.clone(), Account::ZERO, VerifyStatus::Unknown),
        true,
    );
    drop(gate);
    harness.processor.flush();
    // The front-inserted sibling wins the root; the other lands as a fork
    assert!(harness.block_exists(&front.hash()));
    assert_eq!(harness.fork_handler.forks.lock().len(), 1);
    harness.stop();
}
