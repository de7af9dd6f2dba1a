//! # FNV-1a Hashing
//!
//! Setting names are identified at runtime by their 32-bit FNV-1a hash, so
//! the values produced here must be bit-identical to the hashes the driver
//! computes. The 64-bit variant is used only for the blob integrity hash.

const FNV32_OFFSET_BASIS: u32 = 0x811C_9DC5;
const FNV32_PRIME: u32 = 0x0100_0193;

const FNV64_OFFSET_BASIS: u64 = 0xCBF2_9CE4_8422_2325;
const FNV64_PRIME: u64 = 0x0000_0100_0000_01B3;

/// Number of leading magic-buffer bytes covered by [`magic_buffer_id`].
pub const MAGIC_BUFFER_ID_LEN: usize = 64;

/// 32-bit FNV-1a over `bytes`.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV32_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV32_PRIME)
    })
}

/// 32-bit FNV-1a over the UTF-8 bytes of `name`.
pub fn fnv1a_str(name: &str) -> u32 {
    fnv1a(name.as_bytes())
}

/// 64-bit FNV-1a over `bytes`.
pub fn fnv1a_64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV64_OFFSET_BASIS, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV64_PRIME)
    })
}

/// Identifier of a magic buffer: FNV-1a over its first 64 bytes.
///
/// Shorter buffers are hashed whole.
pub fn magic_buffer_id(magic: &[u8]) -> u32 {
    fnv1a(&magic[..magic.len().min(MAGIC_BUFFER_ID_LEN)])
}
