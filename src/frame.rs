//! Binary wire framing for interview audio
//!
//! Every frame on the socket is a 1-byte kind tag followed by the payload.
//! Audio payloads are raw little-endian PCM16 mono samples.
//!
//! Wire format:
//! ```text
//! +----------------+------------------------------------+
//! |    Kind (1)    |         Payload (variable)         |
//! +----------------+------------------------------------+
//! ```

use crate::{Error, Result};

/// Frame kinds carried on the wire
///
/// Uses a single byte for type identification, leaving room for future
/// frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Client-originated audio (microphone, input rate)
    ClientAudio = 0x01,
    /// Server-originated audio (synthesized speech, output rate)
    ServerAudio = 0x02,
}

impl FrameKind {
    /// Convert from byte value
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::ClientAudio),
            0x02 => Some(Self::ServerAudio),
            _ => None,
        }
    }

    /// Convert to byte value
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Encode a microphone chunk as a client audio frame
///
/// Prepends the `ClientAudio` kind byte to the little-endian byte
/// representation of the samples. Chunk sizing is the capture pipeline's
/// concern; no limit is enforced here.
#[must_use]
pub fn encode_client_audio(samples: &[i16]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + samples.len() * 2);
    frame.push(FrameKind::ClientAudio.to_byte());
    for sample in samples {
        frame.extend_from_slice(&sample.to_le_bytes());
    }
    frame
}

/// Decode a received frame into its kind and payload
///
/// # Errors
///
/// Returns `Error::MalformedFrame` for an empty frame and
/// `Error::UnknownFrameKind` for an unrecognized kind byte. Policy for
/// unknown kinds (ignore vs. fail) is left to the caller.
pub fn decode(frame: &[u8]) -> Result<(FrameKind, &[u8])> {
    let (&kind_byte, payload) = frame.split_first().ok_or(Error::MalformedFrame)?;
    let kind = FrameKind::from_byte(kind_byte).ok_or(Error::UnknownFrameKind(kind_byte))?;
    Ok((kind, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_byte_roundtrip() {
        assert_eq!(FrameKind::from_byte(0x01), Some(FrameKind::ClientAudio));
        assert_eq!(FrameKind::from_byte(0x02), Some(FrameKind::ServerAudio));
        assert_eq!(FrameKind::from_byte(0x03), None);
        assert_eq!(FrameKind::ClientAudio.to_byte(), 0x01);
        assert_eq!(FrameKind::ServerAudio.to_byte(), 0x02);
    }

    #[test]
    fn test_encode_prefixes_kind() {
        let frame = encode_client_audio(&[0x0102, -2]);
        assert_eq!(frame[0], 0x01);
        // Little-endian sample bytes follow the tag
        assert_eq!(&frame[1..], &[0x02, 0x01, 0xfe, 0xff]);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let samples = [0i16, 1, -1, i16::MAX, i16::MIN, 12345];
        let frame = encode_client_audio(&samples);

        let (kind, payload) = decode(&frame).unwrap();
        assert_eq!(kind, FrameKind::ClientAudio);

        let decoded: Vec<i16> = payload
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_decode_empty_frame() {
        assert!(matches!(decode(&[]), Err(Error::MalformedFrame)));
    }

    #[test]
    fn test_decode_unknown_kind() {
        assert!(matches!(
            decode(&[0x7f, 0, 0]),
            Err(Error::UnknownFrameKind(0x7f))
        ));
    }

    #[test]
    fn test_decode_empty_payload_is_valid() {
        let (kind, payload) = decode(&[0x02]).unwrap();
        assert_eq!(kind, FrameKind::ServerAudio);
        assert!(payload.is_empty());
    }
}
