use {
  crate::{
    error::ProtocolError,
    inscription::{checksum, Chunk, ChunkManifest, InscriptionPayload},
    params::*,
  },
  bitcoin::{script::Script, ScriptBuf},
};

pub(crate) const OP_FALSE: u8 = 0x00;
pub(crate) const OP_RETURN: u8 = 0x6a;
pub(crate) const OP_PUSHDATA1: u8 = 0x4c;
pub(crate) const OP_PUSHDATA2: u8 = 0x4d;
pub(crate) const OP_PUSHDATA4: u8 = 0x4e;

/// A decoded mint script: the metadata push parsed as a payload, plus the raw
/// content push. `truncated` flags a content push whose declared length ran
/// past the end of the script; the remainder is preserved instead of dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
  pub payload: InscriptionPayload,
  pub payload_bytes: Vec<u8>,
  pub content: Vec<u8>,
  pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EncodedInscription {
  Single(ScriptBuf),
  Chunked {
    manifest: ScriptBuf,
    chunks: Vec<ScriptBuf>,
  },
}

fn pushdata4(data: &[u8]) -> Vec<u8> {
  let mut bytes = Vec::with_capacity(data.len() + 5);
  bytes.push(OP_PUSHDATA4);
  bytes.extend_from_slice(&u32::try_from(data.len()).expect("push exceeds 4 GiB").to_le_bytes());
  bytes.extend_from_slice(data);
  bytes
}

fn envelope_script(metadata: &[u8], content: &[u8]) -> ScriptBuf {
  let mut bytes = vec![OP_FALSE, OP_RETURN];
  bytes.extend(pushdata4(metadata));
  bytes.extend(pushdata4(content));
  ScriptBuf::from_bytes(bytes)
}

/// Encodes a payload and its content into mint script(s). Content up to
/// [`MAX_CHUNK_SIZE`] inlines into a single script; anything larger becomes a
/// manifest script plus one script per chunk, with the inline data omitted
/// from the manifest.
pub fn encode(
  payload: &InscriptionPayload,
  content: &[u8],
) -> Result<EncodedInscription, ProtocolError> {
  if content.len() > MAX_CONTENT_SIZE {
    return Err(ProtocolError::Validation(format!(
      "content size {} exceeds {MAX_CONTENT_SIZE} byte limit",
      content.len()
    )));
  }

  if content.len() <= MAX_CHUNK_SIZE {
    let metadata = serde_json::to_vec(payload)
      .map_err(|err| ProtocolError::Format(format!("unserializable payload: {err}")))?;
    return Ok(EncodedInscription::Single(envelope_script(
      &metadata, content,
    )));
  }

  let chunks = chunk_content(content);

  let mut manifest_payload = payload.clone();
  manifest_payload.content.chunks = Some(ChunkManifest {
    total: u32::try_from(chunks.len()).expect("chunk count fits u32"),
    size: u32::try_from(MAX_CHUNK_SIZE).expect("chunk size fits u32"),
    references: Vec::new(),
  });

  let metadata = serde_json::to_vec(&manifest_payload)
    .map_err(|err| ProtocolError::Format(format!("unserializable payload: {err}")))?;

  Ok(EncodedInscription::Chunked {
    manifest: envelope_script(&metadata, &[]),
    chunks: chunks.iter().map(encode_chunk).collect(),
  })
}

pub fn encode_chunk(chunk: &Chunk) -> ScriptBuf {
  let envelope = serde_json::to_vec(chunk).expect("chunk envelope serializes");
  envelope_script(&envelope, &chunk.data)
}

/// Splits content into sequenced chunks with per-chunk checksums. Content at
/// or under the chunk size yields a single chunk, mirroring the mint path.
pub fn chunk_content(content: &[u8]) -> Vec<Chunk> {
  let total_chunks = u32::try_from(((content.len() + MAX_CHUNK_SIZE - 1) / MAX_CHUNK_SIZE).max(1))
    .expect("chunk count fits u32");

  content
    .chunks(MAX_CHUNK_SIZE)
    .enumerate()
    .map(|(sequence_number, data)| Chunk {
      sequence_number: u32::try_from(sequence_number).expect("chunk count fits u32"),
      total_chunks,
      checksum: checksum(data),
      data: data.to_vec(),
    })
    .collect()
}

/// Validates chunk contiguity and checksums, then reassembles the original
/// content in sequence order.
pub fn reassemble(chunks: &[Chunk]) -> Result<Vec<u8>, ProtocolError> {
  if chunks.is_empty() {
    return Err(ProtocolError::Format("no chunks to reassemble".into()));
  }

  let total = chunks[0].total_chunks;
  if total as usize != chunks.len() {
    return Err(ProtocolError::Format(format!(
      "expected {total} chunks, got {}",
      chunks.len()
    )));
  }

  let mut ordered = chunks.to_vec();
  ordered.sort_by_key(|chunk| chunk.sequence_number);

  let mut content = Vec::new();
  for (expected, chunk) in ordered.iter().enumerate() {
    if chunk.sequence_number as usize != expected {
      return Err(ProtocolError::Format(format!(
        "chunk sequence is not contiguous at {expected}"
      )));
    }

    if chunk.total_chunks != total {
      return Err(ProtocolError::Format(
        "chunks disagree on total count".into(),
      ));
    }

    if checksum(&chunk.data) != chunk.checksum {
      return Err(ProtocolError::Format(format!(
        "checksum mismatch on chunk {}",
        chunk.sequence_number
      )));
    }

    content.extend_from_slice(&chunk.data);
  }

  Ok(content)
}

struct Push {
  data: Vec<u8>,
  truncated: bool,
}

fn read_push(bytes: &[u8], pos: &mut usize) -> Result<Push, ProtocolError> {
  let opcode = *bytes
    .get(*pos)
    .ok_or_else(|| ProtocolError::Format("expected push, found end of script".into()))?;
  *pos += 1;

  let length = match opcode {
    0x00 => 0,
    0x01..=0x4b => usize::from(opcode),
    _ if opcode == OP_PUSHDATA1 => {
      let len = *bytes
        .get(*pos)
        .ok_or_else(|| ProtocolError::Format("truncated PUSHDATA1 length".into()))?;
      *pos += 1;
      usize::from(len)
    }
    _ if opcode == OP_PUSHDATA2 => {
      let slice: [u8; 2] = bytes
        .get(*pos..*pos + 2)
        .ok_or_else(|| ProtocolError::Format("truncated PUSHDATA2 length".into()))?
        .try_into()
        .unwrap();
      *pos += 2;
      usize::from(u16::from_le_bytes(slice))
    }
    _ if opcode == OP_PUSHDATA4 => {
      let slice: [u8; 4] = bytes
        .get(*pos..*pos + 4)
        .ok_or_else(|| ProtocolError::Format("truncated PUSHDATA4 length".into()))?
        .try_into()
        .unwrap();
      *pos += 4;
      usize::try_from(u32::from_le_bytes(slice)).unwrap()
    }
    _ => {
      return Err(ProtocolError::Format(format!(
        "unexpected opcode {opcode:#04x} where a push was required"
      )))
    }
  };

  let available = bytes.len() - *pos;
  if length > available {
    let data = bytes[*pos..].to_vec();
    *pos = bytes.len();
    return Ok(Push {
      data,
      truncated: true,
    });
  }

  let data = bytes[*pos..*pos + length].to_vec();
  *pos += length;
  Ok(Push {
    data,
    truncated: false,
  })
}

fn strip_marker(bytes: &[u8]) -> Result<usize, ProtocolError> {
  if bytes.starts_with(&[OP_FALSE, OP_RETURN]) {
    Ok(2)
  } else if bytes.starts_with(&[OP_RETURN]) {
    Ok(1)
  } else {
    Err(ProtocolError::Format(
      "script does not start with an OP_RETURN marker".into(),
    ))
  }
}

pub fn is_inscription_script(script: &Script) -> bool {
  strip_marker(script.as_bytes()).is_ok()
}

fn decode_pushes(script: &Script) -> Result<(Push, Push), ProtocolError> {
  let bytes = script.as_bytes();
  let mut pos = strip_marker(bytes)?;

  let metadata = read_push(bytes, &mut pos)?;

  if metadata.data.is_empty() {
    return Err(ProtocolError::Format("empty metadata push".into()));
  }

  if metadata.truncated {
    return Err(ProtocolError::Format(
      "metadata push ran past the end of the script".into(),
    ));
  }

  let content = read_push(bytes, &mut pos)?;

  Ok((metadata, content))
}

/// Decodes a mint script into its payload and content. Accepts both the
/// `OP_FALSE OP_RETURN` and bare `OP_RETURN` markers and any push encoding.
pub fn decode(script: &Script) -> Result<Envelope, ProtocolError> {
  let (metadata, content) = decode_pushes(script)?;

  let payload: InscriptionPayload = serde_json::from_slice(&metadata.data)
    .map_err(|err| ProtocolError::Format(format!("metadata is not valid JSON: {err}")))?;

  if content.truncated {
    log::warn!(
      "content push truncated; salvaged {} of declared bytes",
      content.data.len()
    );
  }

  Ok(Envelope {
    payload,
    payload_bytes: metadata.data,
    content: content.data,
    truncated: content.truncated,
  })
}

/// Decodes one chunk script back into a [`Chunk`] with its data attached.
pub fn decode_chunk(script: &Script) -> Result<Chunk, ProtocolError> {
  let (metadata, content) = decode_pushes(script)?;

  let mut chunk: Chunk = serde_json::from_slice(&metadata.data)
    .map_err(|err| ProtocolError::Format(format!("chunk envelope is not valid JSON: {err}")))?;

  chunk.data = content.data;
  Ok(chunk)
}
