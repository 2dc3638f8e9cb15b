//! Format normalization: turn an uploaded file into a document the OCR
//! provider accepts, or reject it with a classified [`FileError`].
//!
//! ## Why trust magic bytes over the declared type?
//!
//! Upload transports routinely send `application/octet-stream` or a type
//! copied from the filename. The first bytes of the file are the only thing
//! the uploader cannot get wrong, so detection starts there and the declared
//! type is merely a tiebreaker for JPEG vs PNG ambiguity that never actually
//! arises in practice.
//!
//! No network calls happen here; everything is local validation. Images are
//! decoded once to prove they are well-formed; a corrupt PNG rejected here
//! costs microseconds, the same PNG rejected by the OCR provider costs a
//! round-trip plus a retry budget.

use crate::config::{AnalyzerConfig, ACCEPTED_EXTENSIONS};
use crate::document::{DocumentKind, NormalizedDocument, UploadedFile};
use crate::error::FileError;
use tracing::debug;

/// Detect the document kind from magic bytes, falling back to the declared
/// media type and filename extension.
fn detect_kind(file: &UploadedFile) -> Option<DocumentKind> {
    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    if file.bytes.starts_with(b"%PDF") {
        return Some(DocumentKind::Pdf);
    }
    if file.bytes.starts_with(&PNG_MAGIC) {
        return Some(DocumentKind::Png);
    }
    if file.bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(DocumentKind::Jpeg);
    }

    // No recognisable magic: fall back to what the uploader declared.
    match file.media_type.as_str() {
        "application/pdf" => Some(DocumentKind::Pdf),
        "image/png" => Some(DocumentKind::Png),
        "image/jpeg" | "image/jpg" => Some(DocumentKind::Jpeg),
        _ => extension(&file.filename).and_then(kind_for_extension),
    }
}

fn extension(filename: &str) -> Option<&str> {
    filename.rsplit_once('.').map(|(_, ext)| ext)
}

/// Map a filename extension onto a document kind, case-insensitively.
/// [`ACCEPTED_EXTENSIONS`] is the authoritative allow-list.
fn kind_for_extension(ext: &str) -> Option<DocumentKind> {
    let ext = ext.to_ascii_lowercase();
    if !ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    match ext.as_str() {
        "pdf" => Some(DocumentKind::Pdf),
        "png" => Some(DocumentKind::Png),
        _ => Some(DocumentKind::Jpeg),
    }
}

/// What the uploader appears to have sent, for the `UnsupportedFormat` detail.
fn describe_type(file: &UploadedFile) -> String {
    if !file.media_type.is_empty() {
        file.media_type.clone()
    } else {
        extension(&file.filename).unwrap_or("unknown").to_string()
    }
}

/// Count pages of a PDF by scanning for page objects.
///
/// This is a byte-level estimate, not a full parse: `/Type /Page` entries
/// (excluding the `/Pages` tree nodes) correspond one-to-one with pages in
/// every writer we have seen. The count only feeds the report and size
/// heuristics, so an off-by-a-few on an exotic writer is harmless.
fn count_pdf_pages(bytes: &[u8]) -> usize {
    let mut count = 0;
    let needle: &[u8] = b"/Type";
    let mut i = 0;
    while i + needle.len() <= bytes.len() {
        if &bytes[i..i + needle.len()] == needle {
            let mut j = i + needle.len();
            while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\r' || bytes[j] == b'\n') {
                j += 1;
            }
            if bytes[j..].starts_with(b"/Page")
                && !bytes[j..].starts_with(b"/Pages")
            {
                count += 1;
            }
            i = j;
        } else {
            i += 1;
        }
    }
    count.max(1)
}

/// Validate the PDF byte stream without parsing the object graph.
///
/// Checks the `%PDF-` header and the `%%EOF` trailer marker. Deeper
/// corruption surfaces at the OCR provider as a permanent
/// malformed-input rejection, which the extractor does not retry.
fn validate_pdf(filename: &str, bytes: &[u8]) -> Result<(), FileError> {
    if !bytes.starts_with(b"%PDF-") {
        return Err(FileError::CorruptDocument {
            filename: filename.to_string(),
            detail: "missing %PDF header".into(),
        });
    }
    // Trailer marker may be followed by a newline; search the final 1 KiB.
    let tail_start = bytes.len().saturating_sub(1024);
    let tail = &bytes[tail_start..];
    if !tail.windows(5).any(|w| w == b"%%EOF") {
        return Err(FileError::CorruptDocument {
            filename: filename.to_string(),
            detail: "missing %%EOF trailer".into(),
        });
    }
    Ok(())
}

/// Validate an image by decoding it once.
fn validate_image(filename: &str, bytes: &[u8], kind: DocumentKind) -> Result<(), FileError> {
    let format = match kind {
        DocumentKind::Png => image::ImageFormat::Png,
        DocumentKind::Jpeg => image::ImageFormat::Jpeg,
        DocumentKind::Pdf => unreachable!("images only"),
    };
    image::load_from_memory_with_format(bytes, format).map_err(|e| FileError::CorruptDocument {
        filename: filename.to_string(),
        detail: e.to_string(),
    })?;
    Ok(())
}

/// Normalize one uploaded file into a document the OCR provider accepts.
///
/// Rejections, in check order:
/// - `UnsupportedFormat`: not one of {pdf, png, jpg, jpeg};
/// - `DocumentTooLarge`: over the per-type size limit;
/// - `CorruptDocument`: bytes fail validation for the detected type.
pub fn normalize_file(
    file: &UploadedFile,
    config: &AnalyzerConfig,
) -> Result<NormalizedDocument, FileError> {
    let kind = detect_kind(file).ok_or_else(|| FileError::UnsupportedFormat {
        filename: file.filename.clone(),
        detected: describe_type(file),
    })?;

    let limit = config.size_limit(kind);
    if file.bytes.len() > limit {
        return Err(FileError::DocumentTooLarge {
            filename: file.filename.clone(),
            size_bytes: file.bytes.len(),
            limit_bytes: limit,
        });
    }
    if file.bytes.is_empty() {
        return Err(FileError::CorruptDocument {
            filename: file.filename.clone(),
            detail: "empty file".into(),
        });
    }

    let page_count = match kind {
        DocumentKind::Pdf => {
            validate_pdf(&file.filename, &file.bytes)?;
            count_pdf_pages(&file.bytes)
        }
        DocumentKind::Png | DocumentKind::Jpeg => {
            validate_image(&file.filename, &file.bytes, kind)?;
            1
        }
    };

    debug!(
        filename = %file.filename,
        ?kind,
        page_count,
        size = file.bytes.len(),
        "normalized upload"
    );

    Ok(NormalizedDocument {
        filename: file.filename.clone(),
        kind,
        page_count,
        bytes: file.bytes.clone(),
    })
}
