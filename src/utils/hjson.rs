// HJSON document reading
//
// A quoteless HJSON value is a number only when the number ends the value;
// otherwise the whole rest of the line is a string (`Date: 2023-04-26`,
// `Track: 89/98`, `xxHash: 3395adc789baf3b`). deser-hjson commits to a number
// on the first digit, so such members are quoted before parsing.

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

const MULTILINE_QUOTE: &str = "'''";

fn member_regex() -> Option<&'static Regex> {
    static MEMBER: OnceLock<Option<Regex>> = OnceLock::new();
    MEMBER
        .get_or_init(|| {
            Regex::new(
                r#"^(\s*(?:"(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|[^\s,:\[\]{}"']+)\s*:\s*)(-?[0-9].*?)\s*$"#,
            )
            .ok()
        })
        .as_ref()
}

fn number_regex() -> Option<&'static Regex> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    NUMBER
        .get_or_init(|| {
            Regex::new(r"^-?(?:0|[1-9][0-9]*)(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?\s*(?:$|[,\]}]|#|//|/\*)")
                .ok()
        })
        .as_ref()
}

/// Whether a quoteless value reads as a number
pub fn is_number_value(value: &str) -> bool {
    number_regex().is_some_and(|re| re.is_match(value.trim()))
}

/// Quote every digit-leading member value that is not a plain number.
///
/// Lines inside `'''` multiline strings are left alone.
pub fn quote_numeric_strings(text: &str) -> Cow<'_, str> {
    let Some(member) = member_regex() else {
        return Cow::Borrowed(text);
    };

    let mut out = String::with_capacity(text.len() + 16);
    let mut changed = false;
    let mut in_multiline = false;

    for line in text.split_inclusive('\n') {
        let quotes = line.matches(MULTILINE_QUOTE).count();
        if in_multiline || quotes > 0 {
            in_multiline ^= quotes % 2 == 1;
            out.push_str(line);
            continue;
        }

        match member.captures(line) {
            Some(caps) if !is_number_value(&caps[2]) => {
                let quoted = serde_json::to_string(&caps[2]).unwrap_or_default();
                out.push_str(&caps[1]);
                out.push_str(&quoted);
                if line.ends_with('\n') {
                    out.push('\n');
                }
                changed = true;
            }
            _ => out.push_str(line),
        }
    }

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(text)
    }
}

/// Parse an HJSON (or JSON) document into an order-preserving value
pub fn parse_document(text: &str) -> Result<Value, deser_hjson::Error> {
    deser_hjson::from_str(&quote_numeric_strings(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_values() {
        assert!(is_number_value("1"));
        assert!(is_number_value("1.0"));
        assert!(is_number_value("-2.5e3"));
        assert!(is_number_value("3,"));
        assert!(is_number_value("4 # note"));
        assert!(!is_number_value("2023-04-26"));
        assert!(!is_number_value("89/98"));
        assert!(!is_number_value("3395adc789baf3b"));
        assert!(!is_number_value("007"));
        assert!(!is_number_value("1.0 beta"));
    }

    #[test]
    fn test_digit_leading_strings_are_quoted() {
        let text = "{\n  Date: 2023-04-26\n  Version: 1.0\n  Title: 1999 Remix\n}";
        let quoted = quote_numeric_strings(text);
        assert_eq!(
            quoted,
            "{\n  Date: \"2023-04-26\"\n  Version: 1.0\n  Title: \"1999 Remix\"\n}"
        );
    }

    #[test]
    fn test_untouched_documents_are_borrowed() {
        let text = "{\n  Title: Song\n  Version: 2\n  \"Track\": \"1/2\"\n}";
        assert!(matches!(quote_numeric_strings(text), Cow::Borrowed(_)));
    }

    #[test]
    fn test_multiline_strings_are_left_alone() {
        let text = "{\n  Comment:\n    '''\n    Note: 12-3\n    '''\n  Track: 1/2\n}";
        assert_eq!(
            quote_numeric_strings(text),
            "{\n  Comment:\n    '''\n    Note: 12-3\n    '''\n  Track: \"1/2\"\n}"
        );
    }

    #[test]
    fn test_parse_quoteless_record() {
        let text = "{\n  xxHash: 3395adc789baf3b\n  Date: 2023-04-26\n  Track: 89/98\n  Version: 1.0\n  Discnumber: 2\n}";
        let value = parse_document(text).unwrap();
        assert_eq!(value["xxHash"], json!("3395adc789baf3b"));
        assert_eq!(value["Date"], json!("2023-04-26"));
        assert_eq!(value["Track"], json!("89/98"));
        assert_eq!(value["Version"].to_string(), "1.0");
        assert_eq!(value["Discnumber"], json!(2));
    }

    #[test]
    fn test_quoted_keys_and_crlf() {
        let text = "{\r\n  \"Cover Artist\": 2 Voices\r\n}\r\n";
        let value = parse_document(text).unwrap();
        assert_eq!(value["Cover Artist"], json!("2 Voices"));
    }
}
