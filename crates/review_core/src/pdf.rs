//! crates/review_core/src/pdf.rs
//!
//! Decoding of uploaded PDF payloads and generation of their storage names.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;

const PDF_DATA_URI_PREFIX: &str = "data:application/pdf;base64,";
const PDF_MIME: &str = "application/pdf";

/// Directory prefix under which every stored PDF lives.
pub const PDF_DIRECTORY: &str = "pdf";

/// Strips an optional `data:application/pdf;base64,` prefix.
pub fn strip_data_uri(raw: &str) -> &str {
    raw.strip_prefix(PDF_DATA_URI_PREFIX).unwrap_or(raw)
}

/// Cheap check used during validation: decodes only the leading bytes and
/// sniffs them for the PDF signature.
pub fn has_pdf_signature(raw: &str) -> bool {
    let payload = strip_data_uri(raw);
    let head = &payload.as_bytes()[..payload.len().min(16)];
    match STANDARD.decode(head) {
        Ok(bytes) => is_pdf(&bytes),
        Err(_) => false,
    }
}

/// Decodes the full payload, returning `None` unless it is non-empty base64
/// whose content sniffs as a PDF.
pub fn decode_pdf(raw: &str) -> Option<Vec<u8>> {
    let bytes = STANDARD.decode(strip_data_uri(raw)).ok()?;
    is_pdf(&bytes).then_some(bytes)
}

fn is_pdf(bytes: &[u8]) -> bool {
    infer::get(bytes).is_some_and(|kind| kind.mime_type() == PDF_MIME)
}

/// A fresh, unguessable storage name such as `pdf/9f86d081884c7d659a2feaa0c55ad015.pdf`.
pub fn generate_pdf_name() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}/{}.pdf", PDF_DIRECTORY, hex::encode(bytes))
}

/// Maps a public file name (as used in `/requests/pdf/{filename}`) to its
/// storage name, refusing anything that could escape the PDF directory.
pub fn storage_name_for(filename: &str) -> Option<String> {
    let valid = !filename.is_empty()
        && filename.ends_with(".pdf")
        && filename
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !filename.contains("..");
    valid.then(|| format!("{}/{}", PDF_DIRECTORY, filename))
}
