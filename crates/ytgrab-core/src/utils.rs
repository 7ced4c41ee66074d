//! Formatting helpers shared by the menus and the ETA display.

/// Characters that are invalid in Windows filenames.
const INVALID_TITLE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Device names Windows refuses as file stems, in any case.
const RESERVED_TITLES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Title used when the extractor reports none, or sanitizing leaves nothing.
pub const FALLBACK_TITLE: &str = "video";

/// Format a byte count with 1024-based units and one decimal, e.g. `1.5MB`.
///
/// `None` renders as `N/A`.
pub fn format_size(bytes: Option<f64>) -> String {
    let Some(mut num) = bytes else {
        return "N/A".to_string();
    };

    for unit in ["", "K", "M", "G", "T", "P"] {
        if num.abs() < 1024.0 {
            return format!("{num:.1}{unit}B");
        }
        num /= 1024.0;
    }
    format!("{num:.1}YB")
}

/// Format seconds as `Xm Ys`, truncating the fractional part.
pub fn format_minutes(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let minutes = (seconds / 60.0).floor() as u64;
    let remainder = (seconds % 60.0).floor() as u64;
    format!("{minutes}m {remainder}s")
}

/// Turn a media title into something usable as a file and directory name.
///
/// Path separators and other characters that are invalid on Windows become
/// underscores (runs collapse into one). Leading and trailing spaces and
/// dots are trimmed, and Windows device names such as `CON` get a leading
/// underscore.
pub fn sanitize_title(title: &str) -> String {
    let mut result = String::with_capacity(title.len());
    let mut last_was_replacement = false;

    for c in title.chars() {
        if c.is_control() || INVALID_TITLE_CHARS.contains(&c) {
            if !last_was_replacement {
                result.push('_');
                last_was_replacement = true;
            }
        } else {
            result.push(c);
            last_was_replacement = false;
        }
    }

    let trimmed = result.trim_matches(|c| c == ' ' || c == '.');
    if trimmed.is_empty() {
        return FALLBACK_TITLE.to_string();
    }

    let upper = trimmed.to_uppercase();
    let reserved = RESERVED_TITLES
        .iter()
        .any(|name| upper == *name || upper.starts_with(&format!("{name}.")));
    if reserved {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, "N/A")]
    #[case(Some(0.0), "0.0B")]
    #[case(Some(1023.0), "1023.0B")]
    #[case(Some(1536.0), "1.5KB")]
    #[case(Some(1_000_000.0), "976.6KB")]
    #[case(Some(5.0 * 1024.0 * 1024.0 * 1024.0), "5.0GB")]
    fn test_format_size(#[case] bytes: Option<f64>, #[case] expected: &str) {
        assert_eq!(format_size(bytes), expected);
    }

    #[rstest]
    #[case(0.0, "0m 0s")]
    #[case(59.9, "0m 59s")]
    #[case(61.0, "1m 1s")]
    #[case(3725.5, "62m 5s")]
    #[case(-3.0, "0m 0s")]
    fn test_format_minutes(#[case] seconds: f64, #[case] expected: &str) {
        assert_eq!(format_minutes(seconds), expected);
    }

    #[test]
    fn test_sanitize_title_replaces_separators() {
        assert_eq!(sanitize_title("AC/DC \\ Live"), "AC_DC _ Live");
        assert_eq!(sanitize_title("What? Why?"), "What_ Why_");
        assert_eq!(sanitize_title("a//b"), "a_b");
    }

    #[test]
    fn test_sanitize_title_keeps_unicode() {
        assert_eq!(sanitize_title("観看 ミュージック"), "観看 ミュージック");
    }

    #[rstest]
    #[case("CON", "_CON")]
    #[case("nul", "_nul")]
    #[case("Com1", "_Com1")]
    #[case("LPT9.remix", "_LPT9.remix")]
    #[case(" aux ", "_aux")]
    #[case("CONCERT", "CONCERT")]
    #[case("COM10", "COM10")]
    fn test_sanitize_title_reserved_names(#[case] title: &str, #[case] expected: &str) {
        assert_eq!(sanitize_title(title), expected);
    }

    #[test]
    fn test_sanitize_title_fallback() {
        assert_eq!(sanitize_title(""), FALLBACK_TITLE);
        assert_eq!(sanitize_title(" . "), FALLBACK_TITLE);
    }
}
