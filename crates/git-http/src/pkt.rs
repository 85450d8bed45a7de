//! pkt-line encode/decode and side-band-64k framing (spec §4.1).
//!
//! A packet is a 4-char lowercase hex length prefix covering header+payload,
//! followed by the payload bytes. `0000` (flush), `0001` (delim), and `0002`
//! (response-end) are payload-less special packets.

use thiserror::Error;

/// Maximum total packet size, header included.
pub const MAX_PKT_SIZE: usize = 65_520;
/// Maximum payload a single pkt-line can carry (`MAX_PKT_SIZE` minus the
/// 4-byte length header).
pub const MAX_PAYLOAD_SIZE: usize = MAX_PKT_SIZE - 4;
/// Maximum inner payload of a side-band-64k data packet (one byte of the
/// pkt-line payload is spent on the channel tag).
pub const MAX_SIDEBAND_PAYLOAD: usize = MAX_PAYLOAD_SIZE - 1;

pub const PKT_FLUSH: &[u8] = b"0000";
pub const PKT_DELIM: &[u8] = b"0001";
pub const PKT_RESPONSE_END: &[u8] = b"0002";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PktError {
    #[error("payload of {0} bytes exceeds max pkt-line payload of {MAX_PAYLOAD_SIZE}")]
    PayloadTooLarge(usize),
    #[error("buffer shorter than pkt-line header demands")]
    ShortBuffer,
    #[error("bad pkt-line length: {0}")]
    BadLength(String),
}

/// One decoded pkt-line unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pkt {
    Flush,
    Delim,
    ResponseEnd,
    Data(Vec<u8>),
    /// Payload began with the ASCII `"ERR "` marker; remainder is the message.
    Error(String),
}

/// Side-band-64k channel tag, prefixed to pack-streaming data packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideBandChannel {
    PackData = 1,
    Progress = 2,
    Error = 3,
}

/// Encode `payload` as a single pkt-line (`len_hex(4) || payload`).
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, PktError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(PktError::PayloadTooLarge(payload.len()));
    }
    let total = 4 + payload.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(format!("{total:04x}").as_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// Encode a UTF-8 line, appending nothing — callers supply their own `\n`.
pub fn encode_str(line: &str) -> Result<Vec<u8>, PktError> {
    encode(line.as_bytes())
}

pub fn encode_flush() -> Vec<u8> {
    PKT_FLUSH.to_vec()
}

pub fn encode_delim() -> Vec<u8> {
    PKT_DELIM.to_vec()
}

pub fn encode_response_end() -> Vec<u8> {
    PKT_RESPONSE_END.to_vec()
}

/// Frame `payload` on a side-band-64k channel, chunking so each resulting
/// pkt-line's inner payload never exceeds [`MAX_SIDEBAND_PAYLOAD`].
pub fn encode_sideband_chunks(channel: SideBandChannel, payload: &[u8]) -> Vec<Vec<u8>> {
    if payload.is_empty() {
        return vec![encode_sideband(channel, &[]).expect("empty chunk always fits")];
    }
    payload
        .chunks(MAX_SIDEBAND_PAYLOAD)
        .map(|chunk| encode_sideband(channel, chunk).expect("chunked to fit"))
        .collect()
}

fn encode_sideband(channel: SideBandChannel, payload: &[u8]) -> Result<Vec<u8>, PktError> {
    let mut framed = Vec::with_capacity(1 + payload.len());
    framed.push(channel as u8);
    framed.extend_from_slice(payload);
    encode(&framed)
}

/// Decode one pkt-line unit from the front of `buf`. Returns the unit and
/// the number of bytes consumed.
pub fn decode(buf: &[u8]) -> Result<(Pkt, usize), PktError> {
    if buf.len() < 4 {
        return Err(PktError::ShortBuffer);
    }
    let len_hex = std::str::from_utf8(&buf[..4]).map_err(|_| PktError::BadLength("non-utf8".into()))?;
    let len = usize::from_str_radix(len_hex, 16)
        .map_err(|_| PktError::BadLength(len_hex.to_string()))?;

    match len {
        0 => Ok((Pkt::Flush, 4)),
        1 => Ok((Pkt::Delim, 4)),
        2 => Ok((Pkt::ResponseEnd, 4)),
        3 => Err(PktError::BadLength(len_hex.to_string())),
        n if n < 4 || n > MAX_PKT_SIZE => Err(PktError::BadLength(len_hex.to_string())),
        n => {
            let data_len = n - 4;
            if buf.len() < 4 + data_len {
                return Err(PktError::ShortBuffer);
            }
            let data = &buf[4..4 + data_len];
            if let Some(rest) = data.strip_prefix(b"ERR ") {
                let msg = String::from_utf8_lossy(rest).into_owned();
                Ok((Pkt::Error(msg), 4 + data_len))
            } else {
                Ok((Pkt::Data(data.to_vec()), 4 + data_len))
            }
        }
    }
}

/// Decode every pkt-line in `buf` until it is exhausted.
pub fn decode_all(mut buf: &[u8]) -> Result<Vec<Pkt>, PktError> {
    let mut out = Vec::new();
    while !buf.is_empty() {
        let (pkt, consumed) = decode(buf)?;
        out.push(pkt);
        buf = &buf[consumed..];
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_encode_decode() {
        let payload = b"version 2\n";
        let encoded = encode(payload).unwrap();
        let (pkt, consumed) = decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert!(matches!(pkt, Pkt::Data(d) if d == payload));
    }

    #[test]
    fn flush_delim_response_end() {
        assert_eq!(decode(PKT_FLUSH).unwrap().0, Pkt::Flush);
        assert_eq!(decode(PKT_DELIM).unwrap().0, Pkt::Delim);
        assert_eq!(decode(PKT_RESPONSE_END).unwrap().0, Pkt::ResponseEnd);
    }

    #[test]
    fn max_payload_succeeds_and_one_more_fails() {
        let max = vec![b'a'; MAX_PAYLOAD_SIZE];
        assert!(encode(&max).is_ok());
        let over = vec![b'a'; MAX_PAYLOAD_SIZE + 1];
        assert_eq!(encode(&over), Err(PktError::PayloadTooLarge(MAX_PAYLOAD_SIZE + 1)));
    }

    #[test]
    fn short_buffer_header() {
        assert_eq!(decode(b"00"), Err(PktError::ShortBuffer));
    }

    #[test]
    fn short_buffer_body() {
        let mut encoded = encode(b"hello").unwrap();
        encoded.truncate(encoded.len() - 1);
        assert_eq!(decode(&encoded), Err(PktError::ShortBuffer));
    }

    #[test]
    fn bad_length_non_numeric() {
        assert!(matches!(decode(b"zzzz"), Err(PktError::BadLength(_))));
    }

    #[test]
    fn error_packet_strips_err_prefix() {
        let encoded = encode(b"ERR no such ref\n").unwrap();
        let (pkt, _) = decode(&encoded).unwrap();
        assert_eq!(pkt, Pkt::Error("no such ref\n".to_string()));
    }

    #[test]
    fn decode_all_handles_sequence() {
        let mut buf = Vec::new();
        buf.extend(encode(b"a\n").unwrap());
        buf.extend(encode(b"b\n").unwrap());
        buf.extend(encode_flush());
        let pkts = decode_all(&buf).unwrap();
        assert_eq!(pkts.len(), 3);
        assert_eq!(pkts[2], Pkt::Flush);
    }

    #[test]
    fn sideband_chunks_respect_max_size() {
        let payload = vec![7u8; MAX_SIDEBAND_PAYLOAD * 2 + 10];
        let chunks = encode_sideband_chunks(SideBandChannel::PackData, &payload);
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.len() <= MAX_PKT_SIZE);
        }
    }
}
