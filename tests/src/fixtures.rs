//! Test fixtures: a single-node ingestion harness wiring the duplicate
//! filter in front of a block processor backed by the in-memory ledger,
//! with recording fakes on every outbound port.

use bl_01_network_filter::NetworkFilter;
use bl_05_block_processor::adapters::{
    mem_backend, CounterStats, InlineWorker, MemLedger, MemStore, RecordingBootstrap,
    RecordingElections, RecordingForkHandler, RecordingGapCache, RecordingNetwork,
    RecordingVotesCache, RecordingWatcher, RecordingWebsocket,
};
use bl_05_block_processor::{BlockProcessor, NodePorts, ProcessorConfig, Store, WriteQueue};
use shared_types::{
    Account, Amount, Block, BlockHash, Epochs, KeyPair, Message, OpenBlock, SendBlock,
    UncheckedInfo, VerifyStatus, GENESIS_AMOUNT,
};
use std::sync::Arc;

/// Default capacity for the harness duplicate filter.
const FILTER_CAPACITY: usize = 1024;

pub struct NodeHarness {
    pub filter: Arc<NetworkFilter>,
    pub processor: Arc<BlockProcessor<MemStore, MemLedger>>,
    pub store: Arc<MemStore>,
    pub ledger: Arc<MemLedger>,
    pub write_queue: Arc<WriteQueue>,
    pub elections: Arc<RecordingElections>,
    pub fork_handler: Arc<RecordingForkHandler>,
    pub network: Arc<RecordingNetwork>,
    pub gap_cache: Arc<RecordingGapCache>,
    pub bootstrap: Arc<RecordingBootstrap>,
    pub stats: Arc<CounterStats>,
    pub votes_cache: Arc<RecordingVotesCache>,
    pub watcher: Arc<RecordingWatcher>,
    pub websocket: Arc<RecordingWebsocket>,
    pub genesis_key: KeyPair,
    pub genesis: Arc<Block>,
}

impl NodeHarness {
    pub fn new() -> Self {
        Self::with_config(ProcessorConfig::default())
    }

    pub fn with_config(config: ProcessorConfig) -> Self {
        let epochs = Arc::new(Epochs::new());
        let (store, ledger) = mem_backend(epochs.clone(), config.work_threshold);
        let write_queue = Arc::new(WriteQueue::new());
        let elections = Arc::new(RecordingElections::default());
        let fork_handler = Arc::new(RecordingForkHandler::default());
        let network = Arc::new(RecordingNetwork::default());
        let gap_cache = Arc::new(RecordingGapCache::default());
        let bootstrap = Arc::new(RecordingBootstrap::default());
        let stats = Arc::new(CounterStats::default());
        let votes_cache = Arc::new(RecordingVotesCache::default());
        let watcher = Arc::new(RecordingWatcher::default());
        let websocket = Arc::new(RecordingWebsocket::default());
        let ports = NodePorts {
            active: elections.clone(),
            fork_handler: fork_handler.clone(),
            network: network.clone(),
            gap_cache: gap_cache.clone(),
            bootstrap: bootstrap.clone(),
            stats: stats.clone(),
            websocket: Some(websocket.clone()),
            work_watcher: watcher.clone(),
            votes_cache: votes_cache.clone(),
            worker: Arc::new(InlineWorker),
        };
        let processor = BlockProcessor::new(
            config,
            store.clone(),
            ledger.clone(),
            write_queue.clone(),
            ports,
            epochs,
        );
        processor.start();

        let genesis_key = KeyPair::from_seed([0xDD; 32]);
        let genesis = Arc::new(Block::Open(OpenBlock::new(
            BlockHash(*genesis_key.account().as_bytes()),
            genesis_key.account(),
            genesis_key.account(),
            &genesis_key,
            0,
        )));
        ledger.seed_genesis(genesis.clone(), GENESIS_AMOUNT);

        Self {
            filter: Arc::new(NetworkFilter::new(FILTER_CAPACITY).expect("nonzero capacity")),
            processor,
            store,
            ledger,
            write_queue,
            elections,
            fork_handler,
            network,
            gap_cache,
            bootstrap,
            stats,
            votes_cache,
            watcher,
            websocket,
            genesis_key,
            genesis,
        }
    }

    /// Live-network ingress: the publish bytes pass the duplicate filter
    /// before the block is queued. Returns whether the message was fresh.
    pub fn ingest_publish(&self, block: Arc<Block>) -> bool {
        let message = Message::Publish((*block).clone());
        let (duplicate, _digest) = self.filter.apply(&message.to_bytes());
        if !duplicate {
            self.processor.process_active(block);
        }
        !duplicate
    }

    /// Queues a block without an arrival record, as bootstrap would.
    pub fn ingest_stale(&self, block: Arc<Block>) {
        self.processor
            .add(UncheckedInfo::new(block, Account::ZERO, VerifyStatus::Unknown), false);
    }

    pub fn block_exists(&self, hash: &BlockHash) -> bool {
        let txn = self.store.tx_begin_read();
        self.store.block_exists(&txn, hash)
    }

    /// A signed send off the genesis chain leaving `balance` behind.
    pub fn send_from_genesis(&self, previous: BlockHash, destination: Account, balance: Amount) -> Arc<Block> {
        Arc::new(Block::Send(SendBlock::new(
            previous,
            destination,
            balance,
            &self.genesis_key,
            0,
        )))
    }

    pub fn stop(&self) {
        self.processor.stop();
    }
}

impl Default for NodeHarness {
    fn default() -> Self {
        Self::new()
    }
}
