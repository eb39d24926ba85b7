//! Error types for launch provisioning

use std::path::PathBuf;

use launchkit_math::MathError;
use launchkit_types::{Address, StepKind};
use serde::Serialize;
use thiserror::Error;

use crate::orchestrator::ProvisioningState;

/// Failure reported by the chain transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Transaction reached a terminal rejection
    #[error("transaction rejected: {cause}")]
    Rejected { cause: String, logs: Vec<String> },

    /// No finality within the retry budget
    #[error("confirmation timed out after {attempts} attempts")]
    Timeout { attempts: u8 },

    /// RPC endpoint unreachable or returned garbage
    #[error("rpc unavailable: {0}")]
    Unavailable(String),
}

/// Failure inside an SDK call, before anything is submitted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SdkError {
    #[error("failed to build transaction: {0}")]
    Build(String),

    #[error("account not found: {0}")]
    NotFound(Address),

    #[error("query failed: {0}")]
    Query(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid amounts for {context}: {source}")]
    Math {
        context: String,
        #[source]
        source: MathError,
    },
}

#[derive(Error, Debug)]
pub enum KeyError {
    #[error("cannot read keypair {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed keypair: {0}")]
    Format(String),
}

/// A single recipient's escrow could not be created
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("recipient #{index} {label} ({recipient}) failed: {reason}")]
pub struct RecipientStepFailed {
    pub index: usize,
    pub label: String,
    pub recipient: Address,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid amounts: {0}")]
    Math(#[from] MathError),

    #[error("{step} could not be built: {source}")]
    Sdk {
        step: StepKind,
        #[source]
        source: SdkError,
    },

    #[error("{step} rejected by transport: {source}")]
    TransportRejected {
        step: StepKind,
        #[source]
        source: TransportError,
    },

    #[error("{query} query failed: {source}")]
    QueryFailed {
        query: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("provisioning aborted during {state}: {reason}")]
    Aborted {
        state: ProvisioningState,
        reason: String,
    },

    #[error("orchestrator already ran, state is {0}")]
    AlreadyRun(ProvisioningState),
}

pub type Result<T> = std::result::Result<T, ProvisioningError>;
