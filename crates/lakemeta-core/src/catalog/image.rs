//! Catalog image framing.
//!
//! Image layout:
//! ```text
//! [0..4]   magic: "LKMI"
//! [4..8]   meta version: u32 little-endian
//! [8..16]  xxhash64 checksum of the payload, little-endian
//! [16..]   payload: databases, each with its tables
//! ```

use tracing::warn;
use xxhash_rust::xxh64::xxh64;

use crate::error::EncodingError;
use crate::persist::check_meta_version;

/// Magic bytes identifying a catalog image.
pub const IMAGE_MAGIC: &[u8; 4] = b"LKMI";

/// Bytes before the payload.
pub const IMAGE_HEADER_LEN: usize = 16;

/// Prefix `payload` with the image header.
pub(crate) fn seal(meta_version: u32, payload: &[u8]) -> Vec<u8> {
    let mut image = Vec::with_capacity(IMAGE_HEADER_LEN + payload.len());
    image.extend_from_slice(IMAGE_MAGIC);
    image.extend_from_slice(&meta_version.to_le_bytes());
    image.extend_from_slice(&xxh64(payload, 0).to_le_bytes());
    image.extend_from_slice(payload);
    image
}

/// Validate the header of `image` and return its meta version and payload.
pub(crate) fn unseal(image: &[u8]) -> Result<(u32, &[u8]), EncodingError> {
    if image.len() < IMAGE_HEADER_LEN {
        return Err(EncodingError::Truncated {
            needed: IMAGE_HEADER_LEN,
            remaining: image.len(),
        });
    }
    if &image[0..4] != IMAGE_MAGIC {
        return Err(EncodingError::InvalidMagic);
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&image[4..8]);
    let meta_version = u32::from_le_bytes(version);
    check_meta_version(meta_version)?;

    let mut checksum = [0u8; 8];
    checksum.copy_from_slice(&image[8..16]);
    let stored = u64::from_le_bytes(checksum);
    let payload = &image[IMAGE_HEADER_LEN..];
    let computed = xxh64(payload, 0);
    if stored != computed {
        warn!(stored, computed, "catalog image checksum mismatch");
        return Err(EncodingError::ChecksumMismatch { stored, computed });
    }
    Ok((meta_version, payload))
}
