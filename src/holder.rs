use {
  crate::{
    envelope::{OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4, OP_RETURN},
    error::ProtocolError,
    params::*,
  },
  bitcoin::{hashes::Hash, script::Script, PubkeyHash, ScriptBuf, Txid},
  serde::{Deserialize, Serialize},
  std::fmt::{self, Display, Formatter},
};

const P2PKH_LEN: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolderOperation {
  Inscribe,
  Transfer,
}

impl HolderOperation {
  fn to_byte(self) -> u8 {
    match self {
      Self::Inscribe => 1,
      Self::Transfer => 2,
    }
  }

  fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
    match byte {
      1 => Ok(Self::Inscribe),
      2 => Ok(Self::Transfer),
      _ => Err(ProtocolError::Format(format!(
        "unknown holder operation {byte}"
      ))),
    }
  }
}

impl Display for HolderOperation {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(
      f,
      "{}",
      match self {
        Self::Inscribe => "inscribe",
        Self::Transfer => "transfer",
      }
    )
  }
}

/// The record embedded after the P2PKH lock of a holder output. The content
/// id and origin txid never change across transfers; only `operation` and the
/// lock's pubkey hash do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolderMetadata {
  pub version: u8,
  pub prefix: String,
  pub operation: HolderOperation,
  pub name: String,
  #[serde(rename = "contentID")]
  pub content_id: String,
  pub txid: String,
  pub creator: String,
}

impl HolderMetadata {
  /// Metadata for the holder output minted alongside the inscription itself.
  pub fn mint(name: &str, content_id: &str, creator: &str) -> Self {
    Self {
      version: HOLDER_METADATA_VERSION,
      prefix: HOLDER_PREFIX.into(),
      operation: HolderOperation::Inscribe,
      name: name.into(),
      content_id: content_id.into(),
      txid: DEPLOY_TXID_LITERAL.into(),
      creator: creator.into(),
    }
  }

  /// Metadata for the next hop of the ownership chain: operation flips to
  /// transfer and the mint placeholder resolves to the origin txid.
  pub fn for_transfer(&self, origin: Txid) -> Self {
    Self {
      operation: HolderOperation::Transfer,
      txid: if self.txid == DEPLOY_TXID_LITERAL {
        origin.to_string()
      } else {
        self.txid.clone()
      },
      ..self.clone()
    }
  }

  /// Compact binary layout: `MEME` magic, version byte, operation byte, then
  /// u16-LE length-prefixed name, content id, txid, and creator.
  pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&HOLDER_MAGIC);
    bytes.push(self.version);
    bytes.push(self.operation.to_byte());

    for field in [&self.name, &self.content_id, &self.txid, &self.creator] {
      let len = u16::try_from(field.len()).map_err(|_| {
        ProtocolError::Format(format!("holder field exceeds {} bytes", u16::MAX))
      })?;
      bytes.extend_from_slice(&len.to_le_bytes());
      bytes.extend_from_slice(field.as_bytes());
    }

    Ok(bytes)
  }

  pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
    let mut pos = 0;

    let magic = bytes
      .get(..4)
      .ok_or_else(|| ProtocolError::Format("holder record too short for magic".into()))?;
    if magic != HOLDER_MAGIC {
      return Err(ProtocolError::Format("missing MEME magic".into()));
    }
    pos += 4;

    let version = *bytes
      .get(pos)
      .ok_or_else(|| ProtocolError::Format("holder record missing version".into()))?;
    if version != HOLDER_METADATA_VERSION {
      return Err(ProtocolError::Format(format!(
        "unsupported holder version {version}"
      )));
    }
    pos += 1;

    let operation = HolderOperation::from_byte(
      *bytes
        .get(pos)
        .ok_or_else(|| ProtocolError::Format("holder record missing operation".into()))?,
    )?;
    pos += 1;

    let mut fields = Vec::with_capacity(4);
    for name in ["name", "content id", "txid", "creator"] {
      let len_bytes: [u8; 2] = bytes
        .get(pos..pos + 2)
        .ok_or_else(|| ProtocolError::Format(format!("holder record missing {name} length")))?
        .try_into()
        .unwrap();
      pos += 2;
      let len = usize::from(u16::from_le_bytes(len_bytes));

      let field = bytes
        .get(pos..pos + len)
        .ok_or_else(|| ProtocolError::Format(format!("holder record truncated in {name}")))?;
      pos += len;

      fields.push(
        String::from_utf8(field.to_vec())
          .map_err(|_| ProtocolError::Format(format!("holder {name} is not UTF-8")))?,
      );
    }

    let creator = fields.pop().unwrap();
    let txid = fields.pop().unwrap();
    let content_id = fields.pop().unwrap();
    let name = fields.pop().unwrap();

    Ok(Self {
      version,
      prefix: HOLDER_PREFIX.into(),
      operation,
      name,
      content_id,
      txid,
      creator,
    })
  }
}

fn minimal_push(data: &[u8]) -> Vec<u8> {
  let mut bytes = Vec::with_capacity(data.len() + 5);
  match data.len() {
    0..=0x4b => bytes.push(u8::try_from(data.len()).unwrap()),
    0x4c..=0xff => {
      bytes.push(OP_PUSHDATA1);
      bytes.push(u8::try_from(data.len()).unwrap());
    }
    0x100..=0xffff => {
      bytes.push(OP_PUSHDATA2);
      bytes.extend(u16::try_from(data.len()).unwrap().to_le_bytes());
    }
    _ => {
      bytes.push(OP_PUSHDATA4);
      bytes.extend(u32::try_from(data.len()).expect("push length fits 4-byte prefix").to_le_bytes());
    }
  }
  bytes.extend_from_slice(data);
  bytes
}

/// Builds the holder script: a standard P2PKH lock for the owner followed by
/// an OP_RETURN push of the binary holder record.
pub fn encode_holder_script(
  owner: &PubkeyHash,
  metadata: &HolderMetadata,
) -> Result<ScriptBuf, ProtocolError> {
  let mut bytes = ScriptBuf::new_p2pkh(owner).into_bytes();
  bytes.push(OP_RETURN);
  bytes.extend(minimal_push(&metadata.encode()?));
  Ok(ScriptBuf::from_bytes(bytes))
}

fn p2pkh_pubkey_hash(bytes: &[u8]) -> Option<PubkeyHash> {
  let lock = bytes.get(..P2PKH_LEN)?;
  if lock[0] != 0x76 || lock[1] != 0xa9 || lock[2] != 0x14 || lock[23] != 0x88 || lock[24] != 0xac
  {
    return None;
  }
  PubkeyHash::from_slice(&lock[3..23]).ok()
}

/// Recovers the owner and record from a holder script. Fails with a format
/// error unless the script starts with a well-formed P2PKH template and the
/// trailing OP_RETURN payload decodes.
pub fn decode_holder_script(
  script: &Script,
) -> Result<(PubkeyHash, HolderMetadata), ProtocolError> {
  let bytes = script.as_bytes();

  let owner = p2pkh_pubkey_hash(bytes)
    .ok_or_else(|| ProtocolError::Format("holder script lacks a P2PKH lock".into()))?;

  if bytes.get(P2PKH_LEN) != Some(&OP_RETURN) {
    return Err(ProtocolError::Format(
      "holder script lacks an OP_RETURN payload".into(),
    ));
  }

  let payload = read_single_push(&bytes[P2PKH_LEN + 1..])?;
  Ok((owner, HolderMetadata::decode(payload)?))
}

fn read_single_push(bytes: &[u8]) -> Result<&[u8], ProtocolError> {
  let opcode = *bytes
    .first()
    .ok_or_else(|| ProtocolError::Format("empty OP_RETURN payload".into()))?;

  let (offset, length) = match opcode {
    0x01..=0x4b => (1, usize::from(opcode)),
    _ if opcode == OP_PUSHDATA1 => (
      2,
      usize::from(*bytes.get(1).ok_or_else(|| {
        ProtocolError::Format("truncated PUSHDATA1 length".into())
      })?),
    ),
    _ if opcode == OP_PUSHDATA2 => {
      let len: [u8; 2] = bytes
        .get(1..3)
        .ok_or_else(|| ProtocolError::Format("truncated PUSHDATA2 length".into()))?
        .try_into()
        .unwrap();
      (3, usize::from(u16::from_le_bytes(len)))
    }
    _ if opcode == OP_PUSHDATA4 => {
      let len: [u8; 4] = bytes
        .get(1..5)
        .ok_or_else(|| ProtocolError::Format("truncated PUSHDATA4 length".into()))?
        .try_into()
        .unwrap();
      (5, usize::try_from(u32::from_le_bytes(len)).unwrap())
    }
    _ => {
      return Err(ProtocolError::Format(format!(
        "unexpected opcode {opcode:#04x} in holder payload"
      )))
    }
  };

  bytes
    .get(offset..offset + length)
    .ok_or_else(|| ProtocolError::Format("holder payload shorter than declared".into()))
}

pub fn is_holder_script(script: &Script) -> bool {
  decode_holder_script(script).is_ok()
}

/// True when the `MEME` marker bytes appear after the P2PKH lock, whatever
/// else the payload holds.
pub fn has_protocol_marker(script: &Script) -> bool {
  let bytes = script.as_bytes();
  p2pkh_pubkey_hash(bytes).is_some()
    && bytes[P2PKH_LEN..]
      .windows(HOLDER_MAGIC.len())
      .any(|window| window == HOLDER_MAGIC)
}
