//! Wire formats shared by every protocol in the ladder.
//!
//! Three incompatible header shapes coexist: the RDT2.x "simple frame", the
//! Selective-Repeat "window frame", and the stream transport "segment". Each
//! gets its own pack/unpack pair below; all three share the same checksum
//! primitive.
//!
//! `decode` never panics on adversarial input — corrupted frames are the
//! normal case on an unreliable channel, not an exceptional one. Checksum
//! *verification* is left to the caller; `decode` only establishes that the
//! bytes are structurally well-formed enough to extract a checksum field to
//! verify.

pub mod segment;
pub mod simple;
pub mod window;

/// CRC32 truncated to 32 bits.
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
