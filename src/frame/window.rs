//! Selective-Repeat wire frame: `kind(1) | seqnum(4) | crc(4) | payload`.
//!
//! Unlike the RDT2.x frames, the sequence number here is a full 32-bit
//! counter rather than a single alternating bit, since the window can hold
//! many in-flight segments at once.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::checksum;
use crate::error::{RdtError, Result};

pub const WINDOW_KIND_DATA: u8 = 0;
pub const WINDOW_KIND_ACK: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFrame {
    pub kind: u8,
    pub seqnum: u32,
    pub checksum: u32,
    pub payload: Bytes,
}

impl WindowFrame {
    fn new(kind: u8, seqnum: u32, payload: Bytes) -> Self {
        let mut to_check = BytesMut::with_capacity(5 + payload.len());
        to_check.put_u8(kind);
        to_check.put_u32(seqnum);
        to_check.put_slice(&payload);
        Self {
            kind,
            seqnum,
            checksum: checksum(&to_check),
            payload,
        }
    }

    pub fn data(seqnum: u32, payload: Bytes) -> Self {
        Self::new(WINDOW_KIND_DATA, seqnum, payload)
    }

    pub fn ack(seqnum: u32) -> Self {
        Self::new(WINDOW_KIND_ACK, seqnum, Bytes::new())
    }

    pub fn is_ack(&self) -> bool {
        self.kind == WINDOW_KIND_ACK
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(9 + self.payload.len());
        buf.put_u8(self.kind);
        buf.put_u32(self.seqnum);
        buf.put_u32(self.checksum);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < 9 {
            return Err(RdtError::FrameTooShort {
                expected: 9,
                actual: data.len(),
            });
        }
        let kind = data.get_u8();
        let seqnum = data.get_u32();
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
        let mut to_check = BytesMut::with_capacity(5 + self.payload.len());
        to_check.put_u8(self.kind);
        to_check.put_u32(self.seqnum);
        to_check.put_slice(&self.payload);
        checksum(&to_check) == self.checksum
    }
}
