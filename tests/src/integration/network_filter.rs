//! Duplicate suppression over serialized publish messages.

use crate::fixtures::NodeHarness;
use bl_01_network_filter::NetworkFilter;
use shared_types::{Block, KeyPair, Link, Message, StateBlock};

// Serialized publish body for a block, as the network layer would hand to
// the filter.
fn publish_bytes(block: &Block) -> Vec<u8> {
    Message::Publish(block.clone()).to_bytes()
}

#[test]
fn publish_duplicate_detection() {
    let harness = NodeHarness::new();
    let filter = NetworkFilter::new(1).unwrap();
    let genesis_bytes = publish_bytes(&harness.genesis);

    // Fresh message passes, every replay is caught
    assert!(!filter.apply(&genesis_bytes).0);
    for _ in 0..10 {
        assert!(filter.apply(&genesis_bytes).0, "replayed genesis publish must be filtered");
    }

    // A different block passes and then filters the same way
    let key = KeyPair::from_seed([0x21; 32]);
    let state = Block::State(StateBlock::new(
        harness.genesis_key.account(),
        harness.genesis.hash(),
        harness.genesis_key.account(),
        1_000,
        Link([9; 32]),
        &key,
        0,
    ));
    let state_bytes = publish_bytes(&state);
    assert!(!filter.apply(&state_bytes).0);
    for _ in 0..10 {
        assert!(filter.apply(&state_bytes).0);
    }

    // With a single slot the two messages evict each other
    for _ in 0..100 {
        assert!(!filter.apply(&genesis_bytes).0);
        assert!(!filter.apply(&state_bytes).0);
    }

    // With room for both, the first entry survives the second's arrival.
    // Keys are random per filter, so retry the unlikely slot collision.
    let coexisting = (0..5)
        .map(|_| NetworkFilter::new(1024).unwrap())
        .find(|filter| {
            let (_, genesis_digest) = filter.apply(&genesis_bytes);
            let (_, state_digest) = filter.apply(&state_bytes);
            genesis_digest % 1024 != state_digest % 1024
        })
        .expect("five random keys cannot all collide two digests into one slot");
    assert!(coexisting.apply(&genesis_bytes).0, "genesis must still be filtered");
    assert!(coexisting.apply(&state_bytes).0, "the state block must still be filtered");
    harness.stop();
}

#[test]
fn distinct_publishes_all_pass() {
    let harness = NodeHarness::new();
    let filter = NetworkFilter::new(4).unwrap();
    let destination = KeyPair::from_seed([0x22; 32]).account();
    let mut previous = harness.genesis.hash();
    for index in 0..100u64 {
        let send = harness.send_from_genesis(
            previous,
            destination,
            shared_types::GENESIS_AMOUNT - 10 * (index as u128 + 1),
        );
        previous = send.hash();
        assert!(
            !filter.apply(&publish_bytes(&send)).0,
            "a never-seen block must pass the filter"
        );
    }
    harness.stop();
}

/// Simulates a fresh node bootstrapping a large block set and peers
/// republishing the same traffic: the filter must behave as a pure
/// function of its cell array.
#[test]
fn filter_cycle_reaches_fixed_point() {
    const MESSAGES: u128 = 100_000;
    const FILTER_SIZE: usize = 50_000;

    let filter = NetworkFilter::new(FILTER_SIZE).unwrap();
    filter.clear_all();
    assert!(filter.copy().iter().all(|&slot| slot == 0));

    // First pass populates the cells
    for message in 0u128..MESSAGES {
        filter.apply(&message.to_le_bytes());
    }
    let nonzero_after_first: usize = filter.copy().iter().filter(|&&slot| slot != 0).count();
    assert!(nonzero_after_first > 0);

    // Second pass: record how many replays are caught
    let mut filtered_second = 0usize;
    for message in 0u128..MESSAGES {
        if filter.apply(&message.to_le_bytes()).0 {
            filtered_second += 1;
        }
    }
    let nonzero_after_second: usize = filter.copy().iter().filter(|&&slot| slot != 0).count();
    assert_eq!(
        nonzero_after_second, nonzero_after_first,
        "replaying the same traffic must not change cell occupancy"
    );

    // Third identical pass must filter exactly the same count
    let mut filtered_third = 0usize;
    for message in 0u128..MESSAGES {
        if filter.apply(&message.to_le_bytes()).0 {
            filtered_third += 1;
        }
    }
    assert_eq!(
        filtered_third, filtered_second,
        "the filter must reach a deterministic fixed point"
    );
}

#[test]
fn clear_restores_an_entry_to_fresh() {
    let filter = NetworkFilter::new(1).unwrap();
    let bytes = [1u8, 2, 3];
    let (_, digest) = filter.apply(&bytes);
    assert!(filter.apply(&bytes).0);
    filter.clear_digest(digest);
    // Equivalent to applying against an empty filter
    assert!(!filter.apply(&bytes).0);
    assert!(filter.apply(&bytes).0);
}
