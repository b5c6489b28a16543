use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};

use super::ParseError;

/// Decode `input` into text.
///
/// The encoding is chosen in this order:
/// 1. the byte order mark of `input`, which is removed
/// 2. `label`, an encoding label such as `"shift_jis"` or `"latin1"`
/// 3. UTF-8
///
/// Malformed sequences are replaced with U+FFFD.
pub fn decode<'a>(input: &'a [u8], label: Option<&str>) -> Result<Cow<'a, str>, ParseError> {
    let encoding = match label {
        Some(label) => Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| ParseError::UnknownEncoding(label.to_owned()))?,
        None => UTF_8,
    };
    let (text, actual, had_errors) = encoding.decode(input);
    if actual != encoding {
        log::debug!(
            "byte order mark overrides {} with {}",
            encoding.name(),
            actual.name()
        );
    }
    if had_errors {
        log::warn!(
            "input is not valid {}, malformed sequences are replaced",
            actual.name()
        );
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_default() {
        let text = decode("<p>日本語</p>".as_bytes(), None).unwrap();
        assert!(matches!(text, Cow::Borrowed(_)));
        assert_eq!(text, "<p>日本語</p>");
    }

    #[test]
    fn test_label() {
        let text = decode(b"caf\xe9", Some("latin1")).unwrap();
        assert_eq!(text, "café");
        let text = decode(b"\x93\xfa\x96\x7b", Some("Shift_JIS")).unwrap();
        assert_eq!(text, "日本");
    }

    #[test]
    fn test_bom_wins() {
        let text = decode(b"\xef\xbb\xbfcaf\xc3\xa9", Some("latin1")).unwrap();
        assert_eq!(text, "café");
        let text = decode(b"\xff\xfea\x00b\x00", None).unwrap();
        assert_eq!(text, "ab");
    }

    #[test]
    fn test_unknown_label() {
        assert_eq!(
            decode(b"x", Some("klingon")).unwrap_err(),
            ParseError::UnknownEncoding("klingon".to_owned())
        );
    }

    #[test]
    fn test_malformed_utf8() {
        assert_eq!(decode(b"a\xffb", None).unwrap(), "a\u{fffd}b");
    }
}
