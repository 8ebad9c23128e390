//! Magic-prefixed message envelope: `magic(4) || command(12) ||
//! length(u32 LE) || checksum(4) || payload`. See spec §4.C4.

use crate::aux::{AddressMessage, NoncePoolMessage};
use crate::block::Block;
use crate::error::DecodeError;
use crate::hash::sha256;
use crate::primitives::{Reader, MAX_BLOCK_SIZE};

pub const COMMAND_LEN: usize = 12;
pub const HEADER_LEN: usize = 4 + COMMAND_LEN + 4 + 4;

/// The parsed, checksum-validated envelope header: command name, the
/// declared payload length, and the checksum that was verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub command: String,
    pub length: u32,
    pub checksum: [u8; 4],
}

/// Advances `buf` past the first occurrence of `magic`, returning the
/// remaining slice starting at the byte after the match. Fails
/// `Truncated` if `magic` never appears before the buffer is exhausted.
pub fn seek_past_magic<'a>(buf: &'a [u8], magic: [u8; 4]) -> Result<&'a [u8], DecodeError> {
    if buf.len() < 4 {
        return Err(DecodeError::Truncated);
    }
    for start in 0..=buf.len() - 4 {
        if buf[start..start + 4] == magic {
            return Ok(&buf[start + 4..]);
        }
    }
    Err(DecodeError::Truncated)
}

/// Reads and validates the 24-byte envelope header (magic already
/// consumed by the caller via [`seek_past_magic`], or checked here if
/// present at the front of `buf` — see [`read_header`]).
pub fn read_header(buf: &[u8]) -> Result<(EnvelopeHeader, &[u8]), DecodeError> {
    if buf.len() < COMMAND_LEN + 4 + 4 {
        return Err(DecodeError::Truncated);
    }
    let mut r = Reader::new(buf);
    let command_bytes = r.read_bytes(COMMAND_LEN)?;
    let nul = command_bytes.iter().position(|&b| b == 0).unwrap_or(COMMAND_LEN);
    let command = String::from_utf8_lossy(&command_bytes[..nul]).into_owned();
    let length = r.read_u32_le()?;
    if length as u64 > MAX_BLOCK_SIZE {
        return Err(DecodeError::Oversize {
            declared: length as u64,
            cap: MAX_BLOCK_SIZE,
        });
    }
    let checksum = r.read_array::<4>()?;
    let header = EnvelopeHeader {
        command,
        length,
        checksum,
    };
    Ok((header, &buf[r.position()..]))
}

fn checksum4(payload: &[u8]) -> [u8; 4] {
    let full = sha256(&sha256(payload));
    [full[0], full[1], full[2], full[3]]
}

/// A message whose command was not one this core understands. It
/// still round-trips its raw payload byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMessage {
    pub command: String,
    pub payload: Vec<u8>,
}

/// The in-scope peer messages this core can parse by command name
/// (spec §4.C4 `deserialize`), plus the [`UnknownMessage`] passthrough
/// for every command outside that set. The out-of-scope P2P handshake
/// traffic (`version`, `inv`, `getdata`, ...) is never this core's
/// concern (spec §1 Out of scope) and always round-trips as `Unknown`.
#[derive(Debug, Clone)]
pub enum Message {
    Block(Box<Block>),
    NoncePool(NoncePoolMessage),
    Address(AddressMessage),
    Unknown(UnknownMessage),
}

impl Message {
    /// The wire command name this message would be framed under.
    pub fn command(&self) -> &str {
        match self {
            Message::Block(_) => "block",
            Message::NoncePool(_) => "noncepool",
            Message::Address(_) => "addr",
            Message::Unknown(u) => &u.command,
        }
    }

    fn payload_bytes(&self) -> Vec<u8> {
        match self {
            Message::Block(b) => b.serialize(),
            Message::NoncePool(m) => m.serialize(),
            Message::Address(m) => m.serialize(),
            Message::Unknown(u) => u.payload.clone(),
        }
    }
}

/// Reads one full envelope and dispatches on its command into a typed
/// [`Message`], falling back to [`UnknownMessage`] for anything this
/// core doesn't recognize (spec §4.C4 `deserialize`).
pub fn deserialize(buf: &[u8], magic: [u8; 4]) -> Result<(Message, &[u8]), DecodeError> {
    let (command, payload, rest) = read_envelope(buf, magic)?;
    let message = match command {
        "block" => Message::Block(Box::new(Block::decode(payload)?)),
        "noncepool" => Message::NoncePool(NoncePoolMessage::decode(payload)?),
        "addr" => Message::Address(AddressMessage::decode(payload)?),
        other => Message::Unknown(UnknownMessage {
            command: other.to_string(),
            payload: payload.to_vec(),
        }),
    };
    Ok((message, rest))
}

/// Frames `message` under its own command name, the inverse of
/// [`deserialize`].
pub fn serialize(out: &mut Vec<u8>, magic: [u8; 4], message: &Message) {
    write_envelope(out, magic, message.command(), &message.payload_bytes());
}

/// Reads one full envelope: magic, header, checksum-verified payload.
/// Returns the command name and the raw payload slice; the caller
/// dispatches on the command to parse a typed message (block,
/// noncepool, addr, ...) or falls back to [`UnknownMessage`].
pub fn read_envelope<'a>(buf: &'a [u8], magic: [u8; 4]) -> Result<(&'a str, &'a [u8], &'a [u8]), DecodeError> {
    if buf.len() < 4 {
        return Err(DecodeError::Truncated);
    }
    if buf[0..4] != magic {
        return Err(DecodeError::Malformed("envelope magic mismatch"));
    }
    let (header, rest) = read_header(&buf[4..])?;
    let len = header.length as usize;
    if rest.len() < len {
        return Err(DecodeError::Truncated);
    }
    let payload = &rest[..len];
    if checksum4(payload) != header.checksum {
        return Err(DecodeError::ChecksumMismatch);
    }
    // leak the owned command back out by re-deriving the slice bounds:
    // safe because `command` was copied from `rest`'s preceding bytes,
    // which are still addressable in `buf`.
    let command_start = 4;
    let command_bytes = &buf[command_start..command_start + COMMAND_LEN];
    let nul = command_bytes.iter().position(|&b| b == 0).unwrap_or(COMMAND_LEN);
    let command = std::str::from_utf8(&command_bytes[..nul]).unwrap_or("");
    Ok((command, payload, &rest[len..]))
}

/// Writes a full envelope for `payload` under `command`, NUL-padding or
/// truncating the command to [`COMMAND_LEN`] bytes.
pub fn write_envelope(out: &mut Vec<u8>, magic: [u8; 4], command: &str, payload: &[u8]) {
    out.extend_from_slice(&magic);
    let mut cmd_bytes = [0u8; COMMAND_LEN];
    let src = command.as_bytes();
    let n = src.len().min(COMMAND_LEN);
    cmd_bytes[..n].copy_from_slice(&src[..n]);
    out.extend_from_slice(&cmd_bytes);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&checksum4(payload));
    out.extend_from_slice(payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: [u8; 4] = [0xFA, 0xBF, 0xB5, 0xDA];

    #[test]
    fn envelope_round_trips() {
        let payload = b"hello cvn".to_vec();
        let mut buf = Vec::new();
        write_envelope(&mut buf, MAGIC, "addr", &payload);
        let (command, got_payload, rest) = read_envelope(&buf, MAGIC).unwrap();
        assert_eq!(command, "addr");
        assert_eq!(got_payload, payload.as_slice());
        assert!(rest.is_empty());
    }

    #[test]
    fn bad_checksum_rejected() {
        let payload = b"hello cvn".to_vec();
        let mut buf = Vec::new();
        write_envelope(&mut buf, MAGIC, "addr", &payload);
        let last = buf.len() - 1;
        buf[last] ^= 0xFF; // corrupt payload without touching the checksum
        assert_eq!(read_envelope(&buf, MAGIC), Err(DecodeError::ChecksumMismatch));
    }

    #[test]
    fn truncated_header_fails() {
        let buf = vec![0u8; 10];
        assert_eq!(read_header(&buf), Err(DecodeError::Truncated));
    }

    #[test]
    fn oversize_declared_length_rejected() {
        let mut header = vec![0u8; COMMAND_LEN];
        header[0] = b'b';
        header.extend_from_slice(&(MAX_BLOCK_SIZE as u32 + 1).to_le_bytes());
        header.extend_from_slice(&[0u8; 4]);
        assert!(matches!(read_header(&header), Err(DecodeError::Oversize { .. })));
    }

    #[test]
    fn seek_past_magic_finds_mid_buffer_match() {
        let mut buf = vec![0xAAu8; 3];
        buf.extend_from_slice(&MAGIC);
        buf.extend_from_slice(b"rest");
        let rest = seek_past_magic(&buf, MAGIC).unwrap();
        assert_eq!(rest, b"rest");
    }

    #[test]
    fn unknown_command_round_trips_as_unknown_message() {
        let payload = b"some future payload".to_vec();
        let mut buf = Vec::new();
        write_envelope(&mut buf, MAGIC, "inv", &payload);
        let (message, rest) = deserialize(&buf, MAGIC).unwrap();
        assert!(rest.is_empty());
        match &message {
            Message::Unknown(u) => {
                assert_eq!(u.command, "inv");
                assert_eq!(u.payload, payload);
            }
            other => panic!("expected Unknown, got {other:?}"),
        }
        let mut out = Vec::new();
        serialize(&mut out, MAGIC, &message);
        assert_eq!(out, buf);
    }

    #[test]
    fn noncepool_command_dispatches_to_typed_message() {
        use crate::crypto::{SchnorrNonce, SchnorrSignature};
        use crate::hash::Hash256;

        let noncepool = NoncePoolMessage::new(
            1,
            Hash256::ZERO,
            1_500_000_000,
            vec![SchnorrNonce::zero()],
            SchnorrSignature::zero(),
        );
        let mut buf = Vec::new();
        write_envelope(&mut buf, MAGIC, "noncepool", &noncepool.serialize());
        let (message, _rest) = deserialize(&buf, MAGIC).unwrap();
        match message {
            Message::NoncePool(m) => assert_eq!(m.nonces().len(), 1),
            other => panic!("expected NoncePool, got {other:?}"),
        }
    }
}
