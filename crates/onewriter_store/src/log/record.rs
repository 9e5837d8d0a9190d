//! Commit batch framing.
//!
//! Every commit is written as one frame:
//!
//! ```text
//! | magic "OWLB" (4) | payload len u32 LE (4) | payload | crc32(payload) u32 LE (4) |
//! ```
//!
//! and the payload is an op count followed by the ops:
//!
//! ```text
//! put:    | 1u8 | key len u32 | key | value len u32 | value |
//! delete: | 2u8 | key len u32 | key |
//! ```

use crate::error::{StoreError, StoreResult};

/// Magic bytes opening every batch frame.
pub const BATCH_MAGIC: [u8; 4] = *b"OWLB";

/// Bytes of framing around a payload (magic, length, checksum).
pub const FRAME_OVERHEAD: usize = 12;

const OP_PUT: u8 = 1;
const OP_DELETE: u8 = 2;

/// A single write inside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or replace a key.
    Put {
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Remove a key.
    Delete {
        /// Key bytes.
        key: Vec<u8>,
    },
}

/// The writes of one committed transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    /// Ops in application order.
    pub ops: Vec<BatchOp>,
}

/// Result of decoding one frame from the front of a buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A complete, valid frame and the number of bytes it occupied.
    Frame(Batch, usize),
    /// The buffer ends in the middle of a frame.
    Torn,
}

impl Batch {
    /// Encodes the batch into a complete frame.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        put_u32(&mut payload, self.ops.len());
        for op in &self.ops {
            match op {
                BatchOp::Put { key, value } => {
                    payload.push(OP_PUT);
                    put_bytes(&mut payload, key);
                    put_bytes(&mut payload, value);
                }
                BatchOp::Delete { key } => {
                    payload.push(OP_DELETE);
                    put_bytes(&mut payload, key);
                }
            }
        }

        let mut frame = Vec::with_capacity(payload.len() + FRAME_OVERHEAD);
        frame.extend_from_slice(&BATCH_MAGIC);
        put_u32(&mut frame, payload.len());
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&compute_crc32(&payload).to_le_bytes());
        frame
    }

    /// Decodes the frame at the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] for a bad magic, a checksum mismatch
    /// or a payload that does not parse.
    pub fn decode(buf: &[u8]) -> StoreResult<Decoded> {
        if buf.len() < 8 {
            return Ok(Decoded::Torn);
        }
        if buf[..4] != BATCH_MAGIC {
            return Err(StoreError::corrupted("bad batch magic"));
        }

        let payload_len = read_u32(&buf[4..8]) as usize;
        let total = payload_len + FRAME_OVERHEAD;
        if buf.len() < total {
            return Ok(Decoded::Torn);
        }

        let payload = &buf[8..8 + payload_len];
        let stored = read_u32(&buf[8 + payload_len..total]);
        let computed = compute_crc32(payload);
        if stored != computed {
            return Err(StoreError::corrupted(format!(
                "batch checksum mismatch: expected {stored:08x}, got {computed:08x}"
            )));
        }

        let batch = Self::decode_payload(payload)?;
        Ok(Decoded::Frame(batch, total))
    }

    fn decode_payload(payload: &[u8]) -> StoreResult<Self> {
        let mut cursor = Cursor { buf: payload, pos: 0 };
        let count = cursor.u32()? as usize;
        let mut ops = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            let op = match cursor.u8()? {
                OP_PUT => BatchOp::Put {
                    key: cursor.bytes()?,
                    value: cursor.bytes()?,
                },
                OP_DELETE => BatchOp::Delete {
                    key: cursor.bytes()?,
                },
                other => {
                    return Err(StoreError::corrupted(format!("unknown op kind {other}")));
                }
            };
            ops.push(op);
        }
        if cursor.pos != payload.len() {
            return Err(StoreError::corrupted("trailing bytes in batch payload"));
        }
        Ok(Self { ops })
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take(&mut self, n: usize) -> StoreResult<&[u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| StoreError::corrupted("batch payload truncated"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> StoreResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> StoreResult<u32> {
        Ok(read_u32(self.take(4)?))
    }

    fn bytes(&mut self) -> StoreResult<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }
}

fn put_u32(buf: &mut Vec<u8>, value: usize) {
    buf.extend_from_slice(&(value as u32).to_le_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(buf, bytes.len());
    buf.extend_from_slice(bytes);
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// CRC32 (IEEE polynomial) of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> Batch {
        Batch {
            ops: vec![
                BatchOp::Put {
                    key: b"user/1".to_vec(),
                    value: b"alice".to_vec(),
                },
                BatchOp::Delete {
                    key: b"user/2".to_vec(),
                },
            ],
        }
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn frame_length_matches_encoding() {
        let frame = sample().encode();
        match Batch::decode(&frame).unwrap() {
            Decoded::Frame(batch, used) => {
                assert_eq!(batch, sample());
                assert_eq!(used, frame.len());
            }
            Decoded::Torn => panic!("expected a full frame"),
        }
    }

    #[test]
    fn short_buffer_is_torn() {
        let frame = sample().encode();
        for cut in [0, 3, 8, frame.len() - 1] {
            assert_eq!(Batch::decode(&frame[..cut]).unwrap(), Decoded::Torn);
        }
    }

    #[test]
    fn flipped_payload_bit_is_corruption() {
        let mut frame = sample().encode();
        frame[10] ^= 0x01;
        assert!(matches!(
            Batch::decode(&frame),
            Err(StoreError::Corrupted(_))
        ));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut frame = sample().encode();
        frame[0] = b'X';
        assert!(Batch::decode(&frame).is_err());
    }

    proptest! {
        #[test]
        fn any_prefix_never_panics(cut in 0usize..64) {
            let frame = sample().encode();
            let cut = cut.min(frame.len());
            let _ = Batch::decode(&frame[..cut]);
        }
    }
}
