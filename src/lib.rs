#![allow(clippy::too_many_arguments, clippy::type_complexity)]
#![deny(
  clippy::cast_lossless,
  clippy::cast_possible_truncation,
  clippy::cast_possible_wrap,
  clippy::cast_sign_loss
)]

pub use crate::{
  chain::Chain,
  envelope::{EncodedInscription, Envelope},
  error::ProtocolError,
  gateway::{
    BlockchainGateway, GatewayError, InputRecord, OutputRecord, RetryPolicy, TransactionRecord,
    Utxo,
  },
  holder::{HolderMetadata, HolderOperation},
  inscription::{
    Chunk, ChunkManifest, ContentAttributes, ContentDescriptor, InscriptionMetadata,
    InscriptionPayload, Validation,
  },
  recovery::{BlockHeightStats, EntryStatus, IndexedInscription, RecoveryIndexer, RecoveryStatus},
  transfer::{OwnershipTransferProtocol, TransferConfig, TransferStatus, Wallet},
  tx_cache::{CacheStats, TransactionCache},
  verification::{VerificationEngine, VerificationReport},
};


pub mod chain;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod holder;
pub mod inscription;
pub mod logger;
pub mod params;
pub mod recovery;
pub mod transfer;
pub mod tx_cache;
pub mod verification;

pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
