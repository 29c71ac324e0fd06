//! Stream-transport segment: a 16-byte TCP-like header followed by payload.
//!
//! Layout (network byte order): `seq(4) | ack(4) | flags(1) | header_len(1)
//! | window(2) | crc(4) | payload`. The checksum is computed over the header
//! with the checksum field itself zeroed, followed by the payload — the
//! sender can't include the checksum of a checksum, so that field is
//! temporarily blanked out during the computation on both ends.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::checksum;
use crate::error::{RdtError, Result};

pub const HEADER_LEN: u8 = 16;

pub const FLAG_FIN: u8 = 0x01;
pub const FLAG_SYN: u8 = 0x02;
pub const FLAG_ACK: u8 = 0x10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags(pub u8);

impl Flags {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn with(mut self, flag: u8) -> Self {
        self.0 |= flag;
        self
    }

    pub fn has(&self, flag: u8) -> bool {
        self.0 & flag != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub seq: u32,
    pub ack: u32,
    pub flags: Flags,
    pub window: u16,
    pub checksum: u32,
    pub payload: Bytes,
}

impl Segment {
    pub fn new(seq: u32, ack: u32, flags: Flags, window: u16, payload: Bytes) -> Self {
        let mut s = Self {
            seq,
            ack,
            flags,
            window,
            checksum: 0,
            payload,
        };
        s.checksum = s.compute_checksum();
        s
    }

    fn header_with_zero_checksum(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_LEN as usize);
        buf.put_u32(self.seq);
        buf.put_u32(self.ack);
        buf.put_u8(self.flags.0);
        buf.put_u8(HEADER_LEN);
        buf.put_u16(self.window);
        buf.put_u32(0);
        buf
    }

    fn compute_checksum(&self) -> u32 {
        let mut to_check = self.header_with_zero_checksum();
        to_check.put_slice(&self.payload);
        checksum(&to_check)
    }

    pub fn verify(&self) -> bool {
        self.compute_checksum() == self.checksum
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN as usize + self.payload.len());
        buf.put_u32(self.seq);
        buf.put_u32(self.ack);
        buf.put_u8(self.flags.0);
        buf.put_u8(HEADER_LEN);
        buf.put_u16(self.window);
        buf.put_u32(self.checksum);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN as usize {
            return Err(RdtError::FrameTooShort {
                expected: HEADER_LEN as usize,
                actual: data.len(),
            });
        }
        let seq = data.get_u32();
        let ack = data.get_u32();
        let flags = Flags(data.get_u8());
        let header_len = data.get_u8();
        if header_len != HEADER_LEN {
            return Err(RdtError::Malformed("unexpected header_len"));
        }
        let window = data.get_u16();
        let checksum = data.get_u32();
        let payload = Bytes::copy_from_slice(data);
        Ok(Self {
            seq,
            ack,
            flags,
            window,
            checksum,
            payload,
        })
    }

    pub fn is_syn(&self) -> bool {
        self.flags.has(FLAG_SYN)
    }

    pub fn is_fin(&self) -> bool {
        self.flags.has(FLAG_FIN)
    }

    pub fn is_ack(&self) -> bool {
        self.flags.has(FLAG_ACK)
    }
}
