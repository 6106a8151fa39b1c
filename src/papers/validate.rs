//! PDF signature check

/// Every PDF container starts with these four bytes.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// True iff `bytes` starts with `%PDF`. Catches HTML error pages served with
/// a 200 status as well as truncated downloads.
pub fn is_valid_pdf(bytes: &[u8]) -> bool {
    bytes.len() >= PDF_MAGIC.len() && &bytes[..PDF_MAGIC.len()] == PDF_MAGIC
}
