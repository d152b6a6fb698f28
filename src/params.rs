use std::time::Duration;

pub const PROTOCOL_LITERAL: &str = "memepool";
pub const PROTOCOL_VERSION: &str = "1.0";

pub const HOLDER_PREFIX: &str = "meme";
pub const HOLDER_MAGIC: [u8; 4] = *b"MEME";
pub const HOLDER_METADATA_VERSION: u8 = 1;
/// Txid literal carried by the holder output of the mint transaction itself.
pub const DEPLOY_TXID_LITERAL: &str = "deploy";
/// Value of every holder output, in the smallest ledger unit.
pub const HOLDER_VALUE: u64 = 1;

pub const MAX_CHUNK_SIZE: usize = 100 * 1024;
pub const MAX_CONTENT_SIZE: usize = 100 * 1024 * 1024;
pub const MAX_CONTENT_ID_LENGTH: usize = 128;

pub const MIN_CONFIRMATIONS: u32 = 6;
/// Accepted distance between the inscription timestamp and the block time.
pub const TIMESTAMP_VARIANCE_MS: u64 = 30 * 60 * 1000;

pub const BATCH_SIZE: u64 = 100;
pub const CHECKPOINT_INTERVAL: u64 = 100;
pub const MAX_CHECKPOINTS: usize = 5;
pub const MAX_CHAIN_HOPS: usize = 10_000;

pub const CACHE_DURATION: Duration = Duration::from_secs(3600);

pub const SUPPORTED_CONTENT_TYPES: [&str; 3] = ["video/mp4", "video/webm", "video/quicktime"];
