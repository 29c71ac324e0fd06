//! RDT2.0 and RDT2.1 wire frames.
//!
//! RDT2.0 has no sequence numbers and a bare 1-byte control frame; RDT2.1
//! adds an alternating seqnum byte to every frame, control included. They are
//! different wire shapes, not one frame with an optional field, so each gets
//! its own pack/unpack pair.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::checksum;
use crate::error::{RdtError, Result};

// --------------------------------------------------------------------------
// RDT2.0
// --------------------------------------------------------------------------

pub const RDT20_KIND_DATA: u8 = 0;
pub const RDT20_KIND_ACK: u8 = 1;
pub const RDT20_KIND_NAK: u8 = 2;

/// RDT2.0 DATA frame: `kind(1)=0 | crc(4) | payload`. Checksum covers the
/// payload alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdt20Data {
    pub checksum: u32,
    pub payload: Bytes,
}

impl Rdt20Data {
    pub fn new(payload: Bytes) -> Self {
        Self {
            checksum: checksum(&payload),
            payload,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(5 + self.payload.len());
        buf.put_u8(RDT20_KIND_DATA);
        buf.put_u32(self.checksum);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decode without verifying the checksum — checksum verification is
    /// left to the caller.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.is_empty() || data[0] != RDT20_KIND_DATA {
            return Err(RdtError::Malformed("not an RDT2.0 DATA frame"));
        }
        data.advance(1);
        if data.len() < 4 {
            return Err(RdtError::FrameTooShort {
                expected: 4,
                actual: data.len(),
            });
        }
        let checksum = data.get_u32();
        let payload = Bytes::copy_from_slice(data);
        Ok(Self { checksum, payload })
    }

    pub fn verify(&self) -> bool {
        checksum(&self.payload) == self.checksum
    }
}

/// RDT2.0 control frame: a bare single kind byte, no checksum.
pub fn encode_rdt20_control(kind: u8) -> Bytes {
    Bytes::copy_from_slice(&[kind])
}

/// Returns `Some(kind)` only for a well-formed 1-byte control frame.
pub fn decode_rdt20_control(data: &[u8]) -> Option<u8> {
    if data.len() == 1 {
        Some(data[0])
    } else {
        None
    }
}

// --------------------------------------------------------------------------
// RDT2.1 (also used, unmodified, by RDT3.0)
// --------------------------------------------------------------------------

pub const RDT21_KIND_DATA: u8 = 0;
pub const RDT21_KIND_ACK: u8 = 1;
pub const RDT21_KIND_NAK: u8 = 2;

/// RDT2.1 frame: `kind(1) | seqnum(1) | crc(4) | payload`. The checksum
/// covers `kind | seqnum | payload` for every frame, DATA or control —
/// always including the payload, even when it's empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdt21Frame {
    pub kind: u8,
    pub seqnum: u8,
    pub checksum: u32,
    pub payload: Bytes,
}

impl Rdt21Frame {
    fn new(kind: u8, seqnum: u8, payload: Bytes) -> Self {
        let mut to_check = BytesMut::with_capacity(2 + payload.len());
        to_check.put_u8(kind);
        to_check.put_u8(seqnum);
        to_check.put_slice(&payload);
        Self {
            kind,
            seqnum,
            checksum: checksum(&to_check),
            payload,
        }
    }

    pub fn data(seqnum: u8, payload: Bytes) -> Self {
        Self::new(RDT21_KIND_DATA, seqnum, payload)
    }

    pub fn ack(seqnum: u8) -> Self {
        Self::new(RDT21_KIND_ACK, seqnum, Bytes::new())
    }

    pub fn nak(seqnum: u8) -> Self {
        Self::new(RDT21_KIND_NAK, seqnum, Bytes::new())
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(6 + self.payload.len());
        buf.put_u8(self.kind);
        buf.put_u8(self.seqnum);
        buf.put_u32(self.checksum);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < 6 {
            return Err(RdtError::FrameTooShort {
                expected: 6,
                actual: data.len(),
            });
        }
        let kind = data.get_u8();
        let seqnum = data.get_u8();
        let checksum = data.get_u32();
        let payload = Bytes::copy_from_slice(data);
        Ok(Self {
            kind,
            seqnum,
            checksum,
            payload,
        })
    }

    pub fn verify(&self) -> bool {
        let mut to_check = BytesMut::with_capacity(2 + self.payload.len());
        to_check.put_u8(self.kind);
        to_check.put_u8(self.seqnum);
        to_check.put_slice(&self.payload);
        checksum(&to_check) == self.checksum
    }
}
