//! # Settings Blob Codec
//!
//! The hashed document is embedded in the generated source as a byte array
//! so runtime tools can enumerate the settings. Its canonical JSON bytes
//! are XORed against a magic buffer, rotated to start at a per-run offset
//! and tiled to the length of the plaintext. Without a magic buffer the
//! plaintext is embedded as is.
//!
//! The magic buffer is a checked-in constant, so this hides the blob from
//! casual inspection only. The byte layout must stay exactly as the driver
//! decodes it.

use std::path::Path;

use pal_settings_core::{fnv1a_64, magic_buffer_id, CanonicalBytes, SettingsError, MAGIC_BUFFER_ID_LEN};
use rand::RngCore;
use serde::Serialize;

/// XOR key for the settings blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicBuffer {
    bytes: Vec<u8>,
}

impl MagicBuffer {
    /// Smallest accepted buffer.
    pub const MIN_LEN: usize = MAGIC_BUFFER_ID_LEN;

    /// # Errors
    ///
    /// `MagicBuffer` if `bytes` is shorter than [`Self::MIN_LEN`].
    pub fn new(bytes: Vec<u8>) -> Result<Self, SettingsError> {
        if bytes.len() < Self::MIN_LEN {
            return Err(SettingsError::MagicBuffer(format!(
                "magic buffer is {} bytes, at least {} are required",
                bytes.len(),
                Self::MIN_LEN
            )));
        }
        Ok(Self { bytes })
    }

    /// Parse file content: either raw bytes, or comma-separated decimal
    /// byte values (the `magic_buffer.txt` form).
    ///
    /// # Errors
    ///
    /// `MagicBuffer` for a decimal value above 255 or a buffer that is too
    /// short.
    pub fn parse(content: &[u8]) -> Result<Self, SettingsError> {
        let is_text = !content.is_empty()
            && content
                .iter()
                .all(|b| b.is_ascii_digit() || *b == b',' || b.is_ascii_whitespace())
            && content.iter().any(u8::is_ascii_digit);
        if !is_text {
            return Self::new(content.to_vec());
        }

        // Only ASCII bytes passed the check above.
        let text = String::from_utf8_lossy(content);
        let bytes = text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u8>().map_err(|_| {
                    SettingsError::MagicBuffer(format!("\"{s}\" is not a byte value"))
                })
            })
            .collect::<Result<Vec<u8>, _>>()?;
        Self::new(bytes)
    }

    /// Read and parse a magic buffer file.
    ///
    /// # Errors
    ///
    /// `MagicBuffer` naming the path if it cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read(path).map_err(|e| {
            SettingsError::MagicBuffer(format!("cannot read {}: {e}", path.display()))
        })?;
        let magic = Self::parse(&content).map_err(|e| match e {
            SettingsError::MagicBuffer(msg) => {
                SettingsError::MagicBuffer(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        tracing::debug!(path = %path.display(), len = magic.len(), "loaded magic buffer");
        Ok(magic)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// FNV-1a over the first 64 bytes.
    pub fn id(&self) -> u32 {
        magic_buffer_id(&self.bytes)
    }
}

/// XOR `data` with the magic buffer rotated to `offset` and tiled to
/// `data.len()`. Applying it twice with the same key and offset is the
/// identity.
pub fn xor_with_magic(data: &[u8], magic: &MagicBuffer, offset: u32) -> Vec<u8> {
    let key = magic.as_bytes();
    let start = offset as usize % key.len();
    data.iter()
        .zip(key[start..].iter().chain(&key[..start]).cycle())
        .map(|(d, k)| d ^ k)
        .collect()
}

/// Encode plaintext bytes. Without a magic buffer the bytes are returned
/// unchanged.
pub fn encode(plain: &[u8], magic: Option<&MagicBuffer>, offset: u32) -> Vec<u8> {
    match magic {
        Some(magic) => xor_with_magic(plain, magic, offset),
        None => plain.to_vec(),
    }
}

/// Recover plaintext from [`encode`] output.
pub fn xor_decode(encoded: &[u8], magic: Option<&MagicBuffer>, offset: u32) -> Vec<u8> {
    encode(encoded, magic, offset)
}

/// The blob and the metadata embedded next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBlob {
    pub bytes: Vec<u8>,
    /// Rotation offset; zero when unencoded.
    pub magic_offset: u32,
    pub is_encoded: bool,
    /// 64-bit FNV-1a over `bytes`.
    pub hash: u64,
    /// Zero when unencoded.
    pub magic_buffer_id: u32,
}

impl EncodedBlob {
    /// `12,34,56` form for a C++ array initializer.
    pub fn comma_joined(&self) -> String {
        let parts: Vec<String> = self.bytes.iter().map(u8::to_string).collect();
        parts.join(",")
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Canonicalize `doc` and encode it, drawing the rotation offset from `rng`.
///
/// # Errors
///
/// `Canonicalization` if the document cannot be serialized.
pub fn encode_document<T, R>(
    doc: &T,
    magic: Option<&MagicBuffer>,
    rng: &mut R,
) -> Result<EncodedBlob, SettingsError>
where
    T: Serialize,
    R: RngCore + ?Sized,
{
    let plain = CanonicalBytes::new(doc)?;
    let (offset, magic_id) = match magic {
        Some(m) => (rng.next_u32(), m.id()),
        None => (0, 0),
    };
    let bytes = encode(plain.as_bytes(), magic, offset);
    let hash = fnv1a_64(&bytes);
    tracing::debug!(
        len = bytes.len(),
        encoded = magic.is_some(),
        offset,
        "encoded settings blob"
    );
    Ok(EncodedBlob {
        bytes,
        magic_offset: offset,
        is_encoded: magic.is_some(),
        hash,
        magic_buffer_id: magic_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn magic() -> MagicBuffer {
        MagicBuffer::new((0u8..100).collect()).unwrap()
    }

    #[test]
    fn short_buffer_rejected() {
        let err = MagicBuffer::new(vec![1; 63]).unwrap_err();
        assert!(matches!(err, SettingsError::MagicBuffer(_)));
        assert!(MagicBuffer::new(vec![1; 64]).is_ok());
    }

    #[test]
    fn text_form_is_parsed() {
        let text: Vec<String> = (0..64).map(|i| (i * 3).to_string()).collect();
        let content = format!("{}\n", text.join(", "));
        let m = MagicBuffer::parse(content.as_bytes()).unwrap();
        assert_eq!(m.len(), 64);
        assert_eq!(m.as_bytes()[2], 6);
    }

    #[test]
    fn text_form_rejects_out_of_range_values() {
        let content = vec!["300"; 64].join(",");
        assert!(MagicBuffer::parse(content.as_bytes()).is_err());
    }

    #[test]
    fn binary_form_is_used_verbatim() {
        let raw: Vec<u8> = (0..=255).collect();
        let m = MagicBuffer::parse(&raw).unwrap();
        assert_eq!(m.as_bytes(), raw.as_slice());
    }

    #[test]
    fn id_covers_first_64_bytes_only() {
        let mut a: Vec<u8> = (0u8..100).collect();
        let id = MagicBuffer::new(a.clone()).unwrap().id();
        a[80] = 0xFF;
        assert_eq!(MagicBuffer::new(a.clone()).unwrap().id(), id);
        a[10] = 0xFF;
        assert_ne!(MagicBuffer::new(a).unwrap().id(), id);
    }

    #[test]
    fn rotation_starts_at_offset_modulo_length() {
        let m = magic();
        let zeros = vec![0u8; 5];
        assert_eq!(xor_with_magic(&zeros, &m, 3), [3, 4, 5, 6, 7]);
        assert_eq!(xor_with_magic(&zeros, &m, 103), [3, 4, 5, 6, 7]);
        assert_eq!(xor_with_magic(&zeros, &m, 98), [98, 99, 0, 1, 2]);
    }

    #[test]
    fn key_is_tiled_past_its_length() {
        let m = magic();
        let out = xor_with_magic(&vec![0u8; 250], &m, 0);
        assert_eq!(out.len(), 250);
        assert_eq!(out[100], 0);
        assert_eq!(out[249], 49);
    }

    #[test]
    fn unencoded_blob_is_canonical_plaintext() {
        let doc = json!({"b": 1, "a": [true, "x"]});
        let blob = encode_document(&doc, None, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(blob.bytes, br#"{"a":[true,"x"],"b":1}"#);
        assert!(!blob.is_encoded);
        assert_eq!(blob.magic_offset, 0);
        assert_eq!(blob.magic_buffer_id, 0);
        assert_eq!(blob.hash, fnv1a_64(&blob.bytes));
        assert_eq!(blob.comma_joined(), blob.bytes.iter().map(u8::to_string).collect::<Vec<_>>().join(","));
    }

    #[test]
    fn encoded_blob_decodes_with_its_offset() {
        let doc = json!({"ComponentName": "Example", "Settings": []});
        let m = magic();
        let blob = encode_document(&doc, Some(&m), &mut StdRng::seed_from_u64(7)).unwrap();
        assert!(blob.is_encoded);
        assert_eq!(blob.magic_buffer_id, m.id());
        let plain = CanonicalBytes::new(&doc).unwrap();
        assert_ne!(blob.bytes, plain.as_bytes());
        assert_eq!(xor_decode(&blob.bytes, Some(&m), blob.magic_offset), plain.as_bytes());
    }

    #[test]
    fn same_seed_same_blob() {
        let doc = json!({"ComponentName": "Example"});
        let m = magic();
        let a = encode_document(&doc, Some(&m), &mut StdRng::seed_from_u64(42)).unwrap();
        let b = encode_document(&doc, Some(&m), &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn comma_joined_format() {
        let blob = EncodedBlob {
            bytes: vec![1, 22, 255],
            magic_offset: 0,
            is_encoded: false,
            hash: 0,
            magic_buffer_id: 0,
        };
        assert_eq!(blob.comma_joined(), "1,22,255");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn xor_is_self_inverse(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            key in proptest::collection::vec(any::<u8>(), 64..200),
            offset in any::<u32>(),
        ) {
            let m = MagicBuffer::new(key).unwrap();
            let encoded = encode(&data, Some(&m), offset);
            prop_assert_eq!(encoded.len(), data.len());
            prop_assert_eq!(xor_decode(&encoded, Some(&m), offset), data);
        }

        #[test]
        fn no_magic_is_identity(
            data in proptest::collection::vec(any::<u8>(), 0..512),
            offset in any::<u32>(),
        ) {
            prop_assert_eq!(encode(&data, None, offset), data);
        }
    }
}
