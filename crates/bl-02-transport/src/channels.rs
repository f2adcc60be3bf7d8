//! Peer channel registry.
//!
//! Channels are keyed by remote endpoint. Once a handshake attributes a
//! node id to a channel, that id is unique in the directory: learning a
//! peer's real endpoint evicts any stale channel previously recorded for
//! the same node id at a different address.

use parking_lot::Mutex;
use shared_types::Account;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// A live channel to one peer endpoint.
pub struct Channel {
    endpoint: SocketAddr,
    node_id: Mutex<Option<Account>>,
}

impl Channel {
    fn new(endpoint: SocketAddr) -> Self {
        Self {
            endpoint,
            node_id: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn node_id(&self) -> Option<Account> {
        *self.node_id.lock()
    }

    pub fn set_node_id(&self, node_id: Account) {
        *self.node_id.lock() = Some(node_id);
    }
}

#[derive(Default)]
pub struct ChannelDirectory {
    channels: Mutex<HashMap<SocketAddr, Arc<Channel>>>,
}

impl ChannelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the channel for `endpoint`, creating it if absent.
    pub fn insert(&self, endpoint: SocketAddr) -> Arc<Channel> {
        let mut channels = self.channels.lock();
        channels
            .entry(endpoint)
            .or_insert_with(|| Arc::new(Channel::new(endpoint)))
            .clone()
    }

    pub fn channel(&self, endpoint: &SocketAddr) -> Option<Arc<Channel>> {
        self.channels.lock().get(endpoint).cloned()
    }

    /// Applies `modifier` to the channel at `endpoint`, then re-establishes
    /// node-id uniqueness: if the channel now carries a node id also held
    /// by a channel at another endpoint, the other channel is evicted as
    /// stale.
    pub fn modify<F>(&self, endpoint: &SocketAddr, modifier: F)
    where
        F: FnOnce(&Channel),
    {
        let mut channels = self.channels.lock();
        let Some(channel) = channels.get(endpoint).cloned() else {
            return;
        };
        modifier(&channel);
        if let Some(node_id) = channel.node_id() {
            let stale: Vec<SocketAddr> = channels
                .iter()
                .filter(|(other_endpoint, other)| {
                    **other_endpoint != channel.endpoint() && other.node_id() == Some(node_id)
                })
                .map(|(other_endpoint, _)| *other_endpoint)
                .collect();
            for other_endpoint in stale {
                debug!(%other_endpoint, %node_id, "replacing stale channel for node id");
                channels.remove(&other_endpoint);
            }
        }
    }

    pub fn remove(&self, endpoint: &SocketAddr) -> bool {
        self.channels.lock().remove(endpoint).is_some()
    }

    pub fn len(&self) -> usize {
        self.channels.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn insert_is_idempotent_per_endpoint() {
        let directory = ChannelDirectory::new();
        let first = directory.insert(endpoint(7001));
        let second = directory.insert(endpoint(7001));
        assert!(Arc::ptr_eq(&first, &second), "same endpoint must yield the same channel");
        assert_eq!(directory.len(), 1);
    }

    #[test]
    fn handshake_replaces_stale_endpoint() {
        let directory = ChannelDirectory::new();
        let node_id = Account([3u8; 32]);
        let wrong = endpoint(7002);
        let correct = endpoint(7003);

        // A channel recorded at the wrong endpoint but tagged with the
        // peer's node id
        directory.insert(wrong);
        directory.modify(&wrong, |channel| channel.set_node_id(node_id));
        assert_eq!(directory.len(), 1);

        // Handshake at the real endpoint attributes the same node id
        directory.insert(correct);
        directory.modify(&correct, |channel| channel.set_node_id(node_id));

        assert!(directory.channel(&wrong).is_none(), "stale endpoint must be evicted");
        assert!(directory.channel(&correct).is_some());
        assert_eq!(directory.len(), 1, "replacement must not grow the directory");
    }

    #[test]
    fn distinct_node_ids_coexist() {
        let directory = ChannelDirectory::new();
        directory.insert(endpoint(7004));
        directory.insert(endpoint(7005));
        directory.modify(&endpoint(7004), |channel| channel.set_node_id(Account([1; 32])));
        directory.modify(&endpoint(7005), |channel| channel.set_node_id(Account([2; 32])));
        assert_eq!(directory.len(), 2);
    }

    #[test]
    fn modify_missing_endpoint_is_noop() {
        let directory = ChannelDirectory::new();
        directory.modify(&endpoint(7006), |channel| channel.set_node_id(Account([1; 32])));
        assert!(directory.is_empty());
    }
}
