use {
  crate::{error::ProtocolError, params::*},
  bitcoin::hashes::{sha256, Hash},
  serde::{Deserialize, Serialize},
};

/// The JSON record carried in the first push of a mint script. Immutable once
/// published; the deterministic content id is re-derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InscriptionPayload {
  #[serde(rename = "type")]
  pub protocol: String,
  pub version: String,
  pub content: ContentDescriptor,
  pub metadata: InscriptionMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDescriptor {
  #[serde(rename = "type")]
  pub content_type: String,
  pub size: u64,
  /// Creation time in epoch milliseconds, checked against the block time.
  pub timestamp: u64,
  #[serde(rename = "contentHash")]
  pub content_hash: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub duration: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub width: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub height: Option<u32>,
  /// Present when the content bytes live in separate chunk transactions.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub chunks: Option<ChunkManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InscriptionMetadata {
  pub title: String,
  pub creator: String,
  #[serde(rename = "createdAt")]
  pub created_at: u64,
  pub attributes: ContentAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAttributes {
  #[serde(rename = "blockHash")]
  pub block_hash: String,
  pub bitrate: u32,
  pub format: String,
  pub dimensions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkManifest {
  pub total: u32,
  pub size: u32,
  pub references: Vec<String>,
}

/// One piece of oversized content. The envelope JSON carries the sequencing
/// fields and checksum; the data bytes travel in their own script push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
  #[serde(rename = "sequenceNumber")]
  pub sequence_number: u32,
  #[serde(rename = "totalChunks")]
  pub total_chunks: u32,
  pub checksum: String,
  #[serde(skip)]
  pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Validation {
  pub is_valid: bool,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
}

pub fn checksum(data: &[u8]) -> String {
  sha256::Hash::hash(data).to_string()
}

fn suffix(s: &str, n: usize) -> &str {
  let start = s.len().saturating_sub(n);
  &s[start..]
}

/// Deterministic content id: `<slug>-<epochMillis>-<creatorSuffix8>-<blockHashSuffix6>`.
pub fn content_id(file_name: &str, timestamp: u64, creator: &str, block_hash: &str) -> String {
  let slug: String = file_name
    .chars()
    .filter(char::is_ascii_alphanumeric)
    .collect::<String>()
    .to_lowercase();

  format!(
    "{slug}-{timestamp}-{}-{}",
    suffix(creator, 8),
    suffix(block_hash, 6),
  )
}

pub fn validate_content_id(content_id: &str) -> Result<(), ProtocolError> {
  if content_id.is_empty() {
    return Err(ProtocolError::Validation("empty content id".into()));
  }

  if content_id.len() > MAX_CONTENT_ID_LENGTH {
    return Err(ProtocolError::Validation(format!(
      "content id exceeds {MAX_CONTENT_ID_LENGTH} characters"
    )));
  }

  if !content_id
    .chars()
    .all(|c| c.is_ascii_alphanumeric() || c == '-')
  {
    return Err(ProtocolError::Validation(format!(
      "content id `{content_id}` contains illegal characters"
    )));
  }

  Ok(())
}

/// Mint-parameter checks performed before any chain traffic.
pub fn validate_mint_params(
  title: &str,
  creator: &str,
  block_hash: &str,
) -> Result<(), ProtocolError> {
  if title.is_empty() {
    return Err(ProtocolError::Validation("empty title".into()));
  }

  if creator.len() < 25 {
    return Err(ProtocolError::Validation(format!(
      "invalid creator address `{creator}`"
    )));
  }

  if block_hash.len() != 64 || !block_hash.chars().all(|c| c.is_ascii_hexdigit()) {
    return Err(ProtocolError::Validation(format!(
      "invalid block hash `{block_hash}`"
    )));
  }

  Ok(())
}

impl InscriptionPayload {
  pub fn content_id(&self) -> String {
    content_id(
      &self.metadata.title,
      self.metadata.created_at,
      &self.metadata.creator,
      &self.metadata.attributes.block_hash,
    )
  }

  pub fn is_memepool(&self) -> bool {
    self.protocol == PROTOCOL_LITERAL && self.version == PROTOCOL_VERSION
  }

  /// Structural validation of a payload, distinguishing hard errors from
  /// advisory warnings.
  pub fn validate(&self) -> Validation {
    let mut validation = Validation {
      is_valid: true,
      ..Default::default()
    };

    if !self.is_memepool() {
      validation
        .errors
        .push(format!("unknown protocol {}/{}", self.protocol, self.version));
    }

    if !SUPPORTED_CONTENT_TYPES.contains(&self.content.content_type.as_str()) {
      validation.errors.push(format!(
        "unsupported content type `{}`",
        self.content.content_type
      ));
    }

    if self.metadata.title.is_empty() || self.metadata.creator.is_empty() {
      validation
        .errors
        .push("missing required metadata fields".into());
    }

    if self.content.size > MAX_CONTENT_SIZE as u64 {
      validation
        .errors
        .push(format!("content size exceeds {MAX_CONTENT_SIZE} byte limit"));
    }

    if let (Some(width), Some(height)) = (self.content.width, self.content.height) {
      if width > 3840 || height > 2160 {
        validation
          .warnings
          .push("resolution exceeds 4K (3840x2160)".into());
      }
    }

    validation.is_valid = validation.errors.is_empty();
    validation
  }
}

#[cfg(test)]
mod tests {
  use {super::*, crate::test::payload_fixture};

  #[test]
  fn content_id_is_deterministic() {
    let id = content_id(
      "My Meme.mp4",
      1700000000000,
      "mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn",
      "000000000000000000021a55be5fbb8bb1b9df8dcd6e1f02b4f13e3cbd16cb3c",
    );
    assert_eq!(id, "mymememp4-1700000000000-ub1ZJRfn-16cb3c");
  }

  #[test]
  fn payload_round_trips_through_json() {
    let payload = payload_fixture();
    let json = serde_json::to_string(&payload).unwrap();
    assert!(json.contains(r#""type":"memepool""#));
    assert!(json.contains(r#""createdAt""#));
    assert_eq!(
      serde_json::from_str::<InscriptionPayload>(&json).unwrap(),
      payload
    );
  }

  #[test]
  fn validate_flags_unsupported_type() {
    let mut payload = payload_fixture();
    payload.content.content_type = "image/png".into();
    let validation = payload.validate();
    assert!(!validation.is_valid);
    assert!(validation.errors[0].contains("unsupported content type"));
  }

  #[test]
  fn validate_warns_on_oversized_resolution() {
    let mut payload = payload_fixture();
    payload.content.width = Some(7680);
    payload.content.height = Some(4320);
    let validation = payload.validate();
    assert!(validation.is_valid);
    assert_eq!(validation.warnings.len(), 1);
  }

  #[test]
  fn mint_params_are_checked() {
    assert!(validate_mint_params("a.mp4", "mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn", &"ab".repeat(32)).is_ok());
    assert_eq!(
      validate_mint_params("a.mp4", "short", &"ab".repeat(32))
        .unwrap_err()
        .code(),
      "VALIDATION_ERROR"
    );
    assert!(validate_mint_params("a.mp4", "mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn", "beef").is_err());
  }

  #[test]
  fn content_id_validation() {
    assert!(validate_content_id("meme-1700000000000-ub1ZJRfn-16cb3c").is_ok());
    assert!(validate_content_id("").is_err());
    assert!(validate_content_id("../../etc/passwd").is_err());
    assert!(validate_content_id(&"a".repeat(200)).is_err());
  }
}
