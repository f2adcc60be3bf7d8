//! Epoch upgrade sentinels.
//!
//! An epoch block is a state block whose `link` equals a recognized upgrade
//! sentinel. Epoch blocks are signed by the protocol authority for that
//! epoch rather than by the account owner, which is why signature
//! verification needs this table before it can pick the expected signer.

use crate::entities::{Account, Link};
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Epoch {
    Epoch1,
    Epoch2,
}

#[derive(Clone, Default)]
pub struct Epochs {
    links: HashMap<Link, (Epoch, Account)>,
}

impl Epochs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `link` as the sentinel for `epoch`, signed by `signer`.
    pub fn add(&mut self, link: Link, epoch: Epoch, signer: Account) {
        self.links.insert(link, (epoch, signer));
    }

    pub fn is_epoch_link(&self, link: &Link) -> bool {
        self.links.contains_key(link)
    }

    /// Authority account expected to have signed a block with this link.
    pub fn signer(&self, link: &Link) -> Option<Account> {
        self.links.get(link).map(|(_, signer)| *signer)
    }

    pub fn epoch(&self, link: &Link) -> Option<Epoch> {
        self.links.get(link).map(|(epoch, _)| *epoch)
    }
}
