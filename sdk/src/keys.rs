//! Signing identity loading
//!
//! Only the public half leaves this module. Secret bytes are read, checked
//! against the embedded public key length and dropped.

use std::fs;
use std::path::{Path, PathBuf};

use launchkit_types::Address;

use crate::error::KeyError;

const KEYPAIR_LEN: usize = 64;

/// Public side of the wallet that signs and pays for every transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Identity {
    pub address: Address,
}

pub trait KeyLoader {
    fn load(&self) -> Result<Identity, KeyError>;
}

/// Keypair file as written by `solana-keygen`: a JSON array of 64 bytes,
/// secret key followed by public key
#[derive(Clone, Debug)]
pub struct KeypairFile {
    path: PathBuf,
}

impl KeypairFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl KeyLoader for KeypairFile {
    fn load(&self) -> Result<Identity, KeyError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| KeyError::Io {
            path: self.path.clone(),
            source,
        })?;
        let bytes: Vec<u8> = serde_json::from_str(&raw)
            .map_err(|e| KeyError::Format(format!("{}: {}", self.path.display(), e)))?;
        identity_from_keypair_bytes(&bytes)
    }
}

/// Base58-encoded 64-byte keypair, as exported by browser wallets
#[derive(Clone)]
pub struct Base58Keypair {
    encoded: String,
}

impl Base58Keypair {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self { encoded: encoded.into() }
    }
}

impl KeyLoader for Base58Keypair {
    fn load(&self) -> Result<Identity, KeyError> {
        let bytes = bs58::decode(self.encoded.trim())
            .into_vec()
            .map_err(|_| KeyError::Format("keypair is not valid base58".to_string()))?;
        identity_from_keypair_bytes(&bytes)
    }
}

fn identity_from_keypair_bytes(bytes: &[u8]) -> Result<Identity, KeyError> {
    if bytes.len() != KEYPAIR_LEN {
        return Err(KeyError::Format(format!(
            "expected {} keypair bytes, got {}",
            KEYPAIR_LEN,
            bytes.len()
        )));
    }
    let mut public = [0u8; 32];
    public.copy_from_slice(&bytes[32..]);
    Ok(Identity { address: Address::new(public) })
}
