//! Module bytes under benchmark.
//!
//! [`ModuleSource`] holds the raw bytes read once, up front, together with
//! their SHA-256 content hash. The hash identifies the module in reports and
//! keys the compilation cache.

use std::sync::Arc;

/// WebAssembly binary magic number.
const WASM_MAGIC: &[u8; 4] = b"\0asm";

/// The module being benchmarked.
#[derive(Debug, Clone)]
pub struct ModuleSource {
    bytes: Arc<[u8]>,
    content_hash: String,
}

impl ModuleSource {
    /// Wrap module bytes, computing their content hash.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        let content_hash = sha256::digest(&bytes[..]);
        Self {
            bytes,
            content_hash,
        }
    }

    /// Raw module bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex SHA-256 of the bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if there are no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Whether the bytes start with the binary-format magic and a version.
    ///
    /// This is a cheap sanity check, not validation; engines still reject
    /// malformed modules during compilation.
    pub fn has_wasm_header(&self) -> bool {
        self.bytes.len() >= 8 && &self.bytes[0..4] == WASM_MAGIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Minimal valid Wasm module (empty module)
    const MINIMAL_WASM: &[u8] = &[
        0x00, 0x61, 0x73, 0x6d, // magic: \0asm
        0x01, 0x00, 0x00, 0x00, // version: 1
    ];

    #[test]
    fn test_header_valid() {
        assert!(ModuleSource::new(MINIMAL_WASM.to_vec()).has_wasm_header());
    }

    #[test]
    fn test_header_too_small() {
        assert!(!ModuleSource::new(vec![0x00, 0x61]).has_wasm_header());
    }

    #[test]
    fn test_header_bad_magic() {
        let bad = vec![0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        assert!(!ModuleSource::new(bad).has_wasm_header());
    }

    #[test]
    fn test_content_hash() {
        let a = ModuleSource::new(b"hello".to_vec());
        let b = ModuleSource::new(b"hello".to_vec());
        let c = ModuleSource::new(b"world".to_vec());

        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
        assert_eq!(a.content_hash().len(), 64);
        assert_eq!(
            a.content_hash(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_len() {
        let module = ModuleSource::new(MINIMAL_WASM.to_vec());
        assert_eq!(module.len(), 8);
        assert!(!module.is_empty());
    }
}
