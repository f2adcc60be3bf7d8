//! Ed25519 key handling for block authorship.

use crate::entities::{Account, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

/// An ed25519 keypair controlling an account chain.
///
/// The account identifier is the public half of the pair. Blocks in the
/// account's chain are signed over their content hash.
#[derive(Clone)]
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Derives a keypair from a 32-byte seed. Any seed is valid.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(&seed),
        }
    }

    pub fn account(&self) -> Account {
        Account(self.signing.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing.sign(message).to_bytes())
    }
}

/// Verifies `signature` over `message` against the given account.
///
/// Returns `false` both for invalid signatures and for account bytes that do
/// not decode to a valid curve point.
pub fn verify(account: &Account, message: &[u8], signature: &Signature) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(account.as_bytes()) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    key.verify(message, &sig).is_ok()
}
