//! Content hashing for deterministic output verification.
//!
//! Produces a SHA-256 hash of frame pixels and audio, so composited output
//! can be compared bit-exactly across runs and backends.

use sha2::{Digest, Sha256};

use crate::frame::{FrameBuffer, SystemFrame};

/// A content hash digest (SHA-256, 32 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Get the hash as a hex string.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn update_image(hasher: &mut Sha256, image: &FrameBuffer) {
    // Dimensions are part of the hash so equal bytes at different sizes differ.
    hasher.update(image.width.to_le_bytes());
    hasher.update(image.height.to_le_bytes());
    hasher.update(&image.data);
}

fn finish(hasher: Sha256) -> ContentHash {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    ContentHash::from_bytes(bytes)
}

/// Hash of the pixel data of a single frame buffer.
pub fn hash_image(image: &FrameBuffer) -> ContentHash {
    let mut hasher = Sha256::new();
    update_image(&mut hasher, image);
    finish(hasher)
}

/// Hash of a complete output frame, pixels and audio.
pub fn hash_frame(frame: &SystemFrame) -> ContentHash {
    let mut hasher = Sha256::new();
    update_image(&mut hasher, &frame.image);
    hasher.update((frame.audio.len() as u64).to_le_bytes());
    for sample in frame.audio.samples() {
        hasher.update(sample.to_le_bytes());
    }
    finish(hasher)
}
