//! Best-effort text extraction from stored bytes.
//!
//! Plain-text formats are decoded directly; binary formats yield no text
//! and the classifier falls back to filename and request context.

use super::types::TextExtractor;
use super::ProviderError;

/// Extracts text from UTF-8 payloads (txt, csv, html and friends).
/// Anything that does not decode cleanly yields `None` rather than an
/// error.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8], filename: &str) -> Result<Option<String>, ProviderError> {
        match std::str::from_utf8(bytes) {
            Ok(text) if !text.trim().is_empty() => Ok(Some(text.trim().to_string())),
            _ => {
                tracing::debug!(filename, "No extractable text, degrading to filename evidence");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_utf8_text() {
        let extracted = PlainTextExtractor
            .extract(b"  Passport No. C01X00T47  ", "scan.txt")
            .unwrap();
        assert_eq!(extracted.as_deref(), Some("Passport No. C01X00T47"));
    }

    #[test]
    fn binary_bytes_yield_none_not_error() {
        let extracted = PlainTextExtractor
            .extract(&[0x25, 0x50, 0x44, 0x46, 0xFF, 0xFE], "scan.pdf")
            .unwrap();
        assert!(extracted.is_none());
    }

    #[test]
    fn empty_payload_yields_none() {
        assert!(PlainTextExtractor.extract(b"", "x.txt").unwrap().is_none());
        assert!(PlainTextExtractor.extract(b"   ", "x.txt").unwrap().is_none());
    }
}
