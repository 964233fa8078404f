//! Quoted-string tokenization.

use super::{Tokenizer, PAYLOAD_MARKER};
use std::ops::Range;

/// Marks every double-quoted value in a seed message as a substitution
/// point, one template per located value.
///
/// A quoted string immediately followed by `:` (ignoring whitespace) is an
/// object key and is never located. Backslash escapes inside a string are
/// honoured, so `"a\"b"` is a single value.
///
/// # Examples
///
/// ```rust
/// use wsfuzz::generator::{QuotedStringTokenizer, Tokenizer, PAYLOAD_MARKER};
///
/// let templates = QuotedStringTokenizer.tokenize(r#"{"op": "login", "user": "bob"}"#, &[]);
/// assert_eq!(templates.len(), 2);
/// assert_eq!(
///     templates[0],
///     format!(r#"{{"op": "{}", "user": "bob"}}"#, PAYLOAD_MARKER)
/// );
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct QuotedStringTokenizer;

impl Tokenizer for QuotedStringTokenizer {
    fn name(&self) -> &'static str {
        "quoted"
    }

    fn tokenize(&self, seed: &str, ignore: &[String]) -> Vec<String> {
        locate_value_strings(seed)
            .into_iter()
            .filter(|span| !ignore.iter().any(|token| *token == seed[span.clone()]))
            .map(|span| {
                let mut template =
                    String::with_capacity(seed.len() - span.len() + PAYLOAD_MARKER.len());
                template.push_str(&seed[..span.start]);
                template.push_str(PAYLOAD_MARKER);
                template.push_str(&seed[span.end..]);
                template
            })
            .collect()
    }
}

/// Byte ranges of the contents (quotes excluded) of every quoted value.
///
/// Works on arbitrary text, not only valid JSON. An unterminated quote ends
/// the scan.
pub(crate) fn locate_value_strings(text: &str) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'"' {
            i += 1;
            continue;
        }

        let start = i + 1;
        let mut j = start;
        let mut closing = None;
        while j < bytes.len() {
            match bytes[j] {
                b'\\' => j += 2,
                b'"' => {
                    closing = Some(j);
                    break;
                },
                _ => j += 1,
            }
        }

        let Some(end) = closing else {
            break;
        };

        let is_key = bytes[end + 1..]
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b':');
        if !is_key {
            spans.push(start..end);
        }
        i = end + 1;
    }

    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn keys_are_not_located() {
        let seed = r#"{"foo": "bar", "baz": "bar"}"#;
        let spans = locate_value_strings(seed);
        let contents: Vec<_> = spans.iter().map(|s| &seed[s.clone()]).collect();
        assert_eq!(contents, vec!["bar", "bar"]);
    }

    #[test]
    fn escaped_quotes_stay_inside_the_value() {
        let seed = r#"{"msg": "say \"hi\"", "n": "1"}"#;
        let spans = locate_value_strings(seed);
        let contents: Vec<_> = spans.iter().map(|s| &seed[s.clone()]).collect();
        assert_eq!(contents, vec![r#"say \"hi\""#, "1"]);
    }

    #[test]
    fn unterminated_quote_stops_scan() {
        assert_eq!(locate_value_strings(r#"["a", "b"#), vec![2..3]);
        assert!(locate_value_strings("no quotes here").is_empty());
        assert!(locate_value_strings("\"").is_empty());
        assert!(locate_value_strings("\"\\").is_empty());
    }

    #[test]
    fn array_values_and_non_json_text() {
        let seed = r#"["x", "y"] and "z""#;
        assert_eq!(locate_value_strings(seed).len(), 3);
    }

    #[test]
    fn ignored_tokens_produce_no_template() {
        let seed = r#"{"foo": "bar", "baz": "bar"}"#;
        let ignore = vec!["bar".to_string()];
        assert!(QuotedStringTokenizer.tokenize(seed, &ignore).is_empty());
        assert_eq!(QuotedStringTokenizer.tokenize(seed, &[]).len(), 2);
    }

    #[test]
    fn each_template_marks_exactly_one_span() {
        let seed = r#"{"a": "1", "b": "2", "c": "3"}"#;
        let templates = QuotedStringTokenizer.tokenize(seed, &[]);
        assert_eq!(templates.len(), 3);
        for template in &templates {
            assert_eq!(template.matches(PAYLOAD_MARKER).count(), 1);
        }
        assert_eq!(
            templates[1],
            format!(r#"{{"a": "1", "b": "{}", "c": "3"}}"#, PAYLOAD_MARKER)
        );
    }

    #[test]
    fn empty_value_is_located() {
        let templates = QuotedStringTokenizer.tokenize(r#"{"k": ""}"#, &[]);
        assert_eq!(templates, vec![format!(r#"{{"k": "{}"}}"#, PAYLOAD_MARKER)]);
    }
}
