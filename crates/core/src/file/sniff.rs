//! MIME detection by content inspection.
//!
//! Recognizes common container and image signatures from the leading bytes of a
//! file, and falls back to a text/binary decision for everything else. Detected
//! types always carry a `charset` parameter so the encoding criterion of a
//! [`FileHandlerDefinition`](super::FileHandlerDefinition) has something to match.

use mime::Mime;

/// Number of leading bytes read from a file for detection.
pub(crate) const SNIFF_LEN: usize = 8192;

/// Charset reported for non-text content.
pub const BINARY_CHARSET: &str = "binary";

/// Signature table: byte offset, magic bytes, MIME essence.
const SIGNATURES: &[(usize, &[u8], &str)] = &[
    (0, b"\xFF\xD8\xFF", "image/jpeg"),
    (0, b"\x89PNG\r\n\x1a\n", "image/png"),
    (0, b"GIF87a", "image/gif"),
    (0, b"GIF89a", "image/gif"),
    (0, b"II*\x00", "image/tiff"),
    (0, b"MM\x00*", "image/tiff"),
    (0, b"BM", "image/bmp"),
    (0, b"%PDF-", "application/pdf"),
    (0, b"PK\x03\x04", "application/zip"),
    (0, b"\x1F\x8B", "application/gzip"),
    (0, b"ID3", "audio/mpeg"),
    (0, b"fLaC", "audio/flac"),
    (0, b"OggS", "audio/ogg"),
    (0, b"\x1A\x45\xDF\xA3", "video/x-matroska"),
    (0, b"FLV\x01", "video/x-flv"),
    (0, b"\x30\x26\xB2\x75\x8E\x66\xCF\x11", "video/x-ms-asf"),
    (0, b"\x00\x00\x01\xBA", "video/mpeg"),
    (0, b"\x00\x00\x01\xB3", "video/mpeg"),
    (0, b".RMF", "application/vnd.rn-realmedia"),
];

/// MIME type reported for directories.
pub(crate) fn directory_mime() -> Mime {
    with_charset("inode/directory", BINARY_CHARSET)
}

/// Detects the MIME type of a file from its leading bytes.
pub(crate) fn detect(head: &[u8]) -> Mime {
    if head.is_empty() {
        return with_charset("inode/x-empty", BINARY_CHARSET);
    }

    if let Some(essence) = detect_binary(head) {
        return with_charset(essence, BINARY_CHARSET);
    }

    match text_charset(head) {
        Some(charset) => with_charset("text/plain", charset),
        None => with_charset("application/octet-stream", BINARY_CHARSET),
    }
}

fn detect_binary(head: &[u8]) -> Option<&'static str> {
    for &(offset, magic, essence) in SIGNATURES {
        if head.len() >= offset + magic.len() && &head[offset..offset + magic.len()] == magic {
            return Some(essence);
        }
    }

    // RIFF containers carry the form type at offset 8.
    if head.len() >= 12 && &head[0..4] == b"RIFF" {
        return match &head[8..12] {
            b"WAVE" => Some("audio/x-wav"),
            b"AVI " => Some("video/x-msvideo"),
            b"WEBP" => Some("image/webp"),
            _ => None,
        };
    }

    // ISO base media files start with a size then `ftyp` and a major brand.
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return match &head[8..12] {
            b"qt  " => Some("video/quicktime"),
            b"M4A " => Some("audio/mp4"),
            b"3gp4" | b"3gp5" | b"3g2a" => Some("video/3gpp"),
            _ => Some("video/mp4"),
        };
    }

    // Bare MPEG audio frame sync.
    if head.len() >= 2 && head[0] == 0xFF && (head[1] & 0xE0) == 0xE0 {
        return Some("audio/mpeg");
    }

    None
}

/// Classifies the head as text and returns its charset, or `None` for binary content.
fn text_charset(head: &[u8]) -> Option<&'static str> {
    if head.contains(&0) {
        return None;
    }
    if head.is_ascii() {
        return Some("us-ascii");
    }
    match std::str::from_utf8(head) {
        Ok(_) => Some("utf-8"),
        // The sample may cut a multi-byte sequence in half.
        Err(e) if e.error_len().is_none() && head.len() == SNIFF_LEN => Some("utf-8"),
        Err(_) => None,
    }
}

fn with_charset(essence: &str, charset: &str) -> Mime {
    format!("{essence}; charset={charset}")
        .parse()
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn essence(mime: &Mime) -> &str {
        mime.essence_str()
    }

    fn charset(mime: &Mime) -> Option<String> {
        mime.get_param(mime::CHARSET).map(|c| c.as_str().to_string())
    }

    #[test]
    fn test_detect_ascii_text() {
        let mime = detect(b"A TEST FILE WITH CAPS\n");
        assert_eq!(essence(&mime), "text/plain");
        assert_eq!(charset(&mime).as_deref(), Some("us-ascii"));
        assert_eq!(mime.to_string(), "text/plain; charset=us-ascii");
    }

    #[test]
    fn test_detect_utf8_text() {
        let mime = detect("caf\u{e9} cr\u{e8}me".as_bytes());
        assert_eq!(essence(&mime), "text/plain");
        assert_eq!(charset(&mime).as_deref(), Some("utf-8"));
    }

    #[test]
    fn test_detect_binary_fallback() {
        let mime = detect(&[0x00, 0x01, 0x02, 0xFE]);
        assert_eq!(essence(&mime), "application/octet-stream");
        assert_eq!(charset(&mime).as_deref(), Some("binary"));
    }

    #[test]
    fn test_detect_signatures() {
        assert_eq!(essence(&detect(b"\x89PNG\r\n\x1a\n....")), "image/png");
        assert_eq!(essence(&detect(b"ID3\x03\x00....")), "audio/mpeg");
        assert_eq!(essence(&detect(b"RIFF\x00\x00\x00\x00WAVEfmt ")), "audio/x-wav");
        assert_eq!(essence(&detect(b"RIFF\x00\x00\x00\x00AVI LIST")), "video/x-msvideo");
        assert_eq!(
            essence(&detect(b"\x00\x00\x00\x18ftypqt  \x00\x00")),
            "video/quicktime"
        );
        assert_eq!(
            essence(&detect(b"\x00\x00\x00\x18ftypisom\x00\x00")),
            "video/mp4"
        );
        assert_eq!(essence(&detect(b"\x1A\x45\xDF\xA3\x01")), "video/x-matroska");
    }

    #[test]
    fn test_detect_empty_and_directory() {
        assert_eq!(essence(&detect(b"")), "inode/x-empty");
        let dir = directory_mime();
        assert_eq!(essence(&dir), "inode/directory");
        assert_eq!(charset(&dir).as_deref(), Some("binary"));
    }
}
