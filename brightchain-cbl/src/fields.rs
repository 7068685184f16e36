//! Extended-header field validation.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::CblError;

/// longest accepted file name, in bytes
pub const MAX_FILE_NAME_LEN: usize = 255;
/// longest accepted MIME type, in bytes
pub const MAX_MIME_TYPE_LEN: usize = 127;

static FILE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[^/\\:*?"<>|]+$"#).expect("file name pattern"));

static MIME_TYPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9!#$&^_.+-]+/[a-z0-9!#$&^_.+-]+$").expect("mime type pattern")
});

/// check a file name against the header rules: non-empty, trimmed, no
/// path separators or reserved characters, no control characters, no
/// traversal
pub fn validate_file_name(name: &str) -> Result<(), CblError> {
    if name.is_empty() {
        return Err(CblError::field("fileName", "must not be empty"));
    }
    if name.trim() != name {
        return Err(CblError::field(
            "fileName",
            "leading or trailing whitespace",
        ));
    }
    if name.len() > MAX_FILE_NAME_LEN {
        return Err(CblError::field(
            "fileName",
            format!("{} bytes exceeds the {MAX_FILE_NAME_LEN} byte cap", name.len()),
        ));
    }
    if name.chars().any(|c| (c as u32) < 32) {
        return Err(CblError::field("fileName", "control characters"));
    }
    if name.contains("..") {
        return Err(CblError::field("fileName", "path traversal"));
    }
    if !FILE_NAME_RE.is_match(name) {
        return Err(CblError::field("fileName", "reserved characters"));
    }
    Ok(())
}

/// check a MIME type: non-empty, trimmed, lowercase `type/subtype` with
/// the RFC 6838 restricted character set
pub fn validate_mime_type(mime: &str) -> Result<(), CblError> {
    if mime.is_empty() {
        return Err(CblError::field("mimeType", "must not be empty"));
    }
    if mime.trim() != mime {
        return Err(CblError::field(
            "mimeType",
            "leading or trailing whitespace",
        ));
    }
    if mime.len() > MAX_MIME_TYPE_LEN {
        return Err(CblError::field(
            "mimeType",
            format!("{} bytes exceeds the {MAX_MIME_TYPE_LEN} byte cap", mime.len()),
        ));
    }
    if !MIME_TYPE_RE.is_match(mime) {
        return Err(CblError::field("mimeType", "not a lowercase type/subtype"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        validate_file_name("report.txt").unwrap();
        validate_file_name("Quarterly Report (final) v2.pdf").unwrap();
        validate_file_name("数据.bin").unwrap();
    }

    #[test]
    fn rejects_bad_names() {
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name(" padded ").is_err());
        assert!(validate_file_name("a/b.txt").is_err());
        assert!(validate_file_name(r"a\b.txt").is_err());
        assert!(validate_file_name("x:y").is_err());
        assert!(validate_file_name("what?.txt").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name("up..dir").is_err());
        assert!(validate_file_name("bell\u{7}.txt").is_err());
        assert!(validate_file_name(&"x".repeat(256)).is_err());
    }

    #[test]
    fn accepts_ordinary_mime_types() {
        validate_mime_type("text/plain").unwrap();
        validate_mime_type("application/octet-stream").unwrap();
        validate_mime_type("application/vnd.api+json").unwrap();
    }

    #[test]
    fn rejects_bad_mime_types() {
        assert!(validate_mime_type("").is_err());
        assert!(validate_mime_type("Text/Plain").is_err());
        assert!(validate_mime_type("noslash").is_err());
        assert!(validate_mime_type("a/b/c").is_err());
        assert!(validate_mime_type("text/ plain").is_err());
        assert!(validate_mime_type(&format!("text/{}", "x".repeat(127))).is_err());
    }
}
