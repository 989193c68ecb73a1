//! Label-tag text codec.
//!
//! # Responsibility
//! - Parse `label: tag, tag` lines into ordered `(label, tags)` pairs.
//! - Serialize pairs back, quoting values that contain reserved characters.
//!
//! # Invariants
//! - Parsing never aborts; out-of-sequence tokens and an unclosed `"""` are
//!   reported in `LabelTagParse::errors` and the value is still kept.
//! - Backslashes before a closing `"""` are doubled on write, so a value
//!   ending in `\` cannot escape its own wrapper.
//! - Tags are de-duplicated within one label occurrence.
//! - `parse(serialize(pairs)).pairs == pairs` for de-duplicated pairs.

use crate::text::tokenizer::{Tokenizer, TokenizerConfig};
use indexmap::IndexMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Pairs in source order; a label may repeat.
pub type LabelTagPairs = Vec<(String, Vec<String>)>;
/// Labels merged into one entry each, in first-seen order.
pub type LabelTagMap = IndexMap<String, Vec<String>>;

pub const QUOTE: &str = "\"\"\"";
const ESCAPE: &str = "\\";
const COMMENT: &str = "#";
const LINE_END: &str = "\n";
const FIELD_END: &str = ";";
const SEPARATOR: &str = ":";
const TAG_SEPARATOR: &str = ",";
const RESERVED: [&str; 7] = [SEPARATOR, TAG_SEPARATOR, FIELD_END, COMMENT, QUOTE, LINE_END, " "];

/// Non-fatal grammar violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelTagError {
    pub expected: &'static str,
    pub found: String,
    /// Byte offset of the offending token.
    pub offset: usize,
}

impl Display for LabelTagError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "expected {} but found `{}` at byte {}",
            self.expected,
            self.found.escape_debug(),
            self.offset
        )
    }
}

impl Error for LabelTagError {}

/// Parse output: every recovered pair plus the violations met on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTagParse {
    pub pairs: LabelTagPairs,
    pub errors: Vec<LabelTagError>,
}

impl LabelTagParse {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_map(self) -> LabelTagMap {
        fold_pairs(self.pairs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    Label,
    Separator,
    Tag,
    TagEnd,
}

impl Expect {
    fn describe(self) -> &'static str {
        match self {
            Self::Label => "a label",
            Self::Separator => "`:`",
            Self::Tag => "a tag",
            Self::TagEnd => "`,` or end of line",
        }
    }
}

/// Tokenizer tables for the label-tag grammar.
pub fn codec_config() -> TokenizerConfig {
    TokenizerConfig {
        tokens: RESERVED.iter().map(|token| (*token).to_string()).collect(),
        wrappers: vec![
            (QUOTE.to_string(), QUOTE.to_string()),
            (COMMENT.to_string(), LINE_END.to_string()),
        ],
        space_tokens: vec![" ".to_string()],
        escape_symbols: vec![ESCAPE.to_string()],
    }
}

fn trailing_escapes(text: &str) -> usize {
    text.len() - text.trim_end_matches(ESCAPE).len()
}

/// Splits the text after the last inner `"""` into
/// `(body, backslash run, trailing quotes)`.
fn split_tail(rest: &str) -> (&str, usize, &str) {
    let quotes_at = rest.trim_end_matches('"').len();
    let before = &rest[..quotes_at];
    let run = trailing_escapes(before);
    (&before[..quotes_at - run], run, &rest[quotes_at..])
}

/// Wrapper payload for `value`.
///
/// A backslash run of length `n` before an inner `"""` becomes `2n + 1`
/// backslashes. The run before the end of the value, or before its trailing
/// `"` or `""`, becomes `2n`, so it cannot escape the closing marker.
fn escape_payload(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + QUOTE.len());
    let mut rest = value;
    while let Some(at) = rest.find(QUOTE) {
        let head = &rest[..at];
        out.push_str(head);
        out.push_str(&ESCAPE.repeat(trailing_escapes(head) + 1));
        out.push_str(QUOTE);
        rest = &rest[at + QUOTE.len()..];
    }
    let (body, run, quotes) = split_tail(rest);
    out.push_str(body);
    out.push_str(&ESCAPE.repeat(run * 2));
    out.push_str(quotes);
    out
}

/// Inverse of [`escape_payload`].
fn unescape_payload(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len());
    let mut rest = payload;
    while let Some(at) = rest.find(QUOTE) {
        let head = &rest[..at];
        let run = trailing_escapes(head);
        out.push_str(&head[..head.len() - run]);
        out.push_str(&ESCAPE.repeat(run / 2));
        out.push_str(QUOTE);
        rest = &rest[at + QUOTE.len()..];
    }
    let (body, run, quotes) = split_tail(rest);
    out.push_str(body);
    out.push_str(&ESCAPE.repeat(run / 2));
    out.push_str(quotes);
    out
}

struct PairBuilder {
    parse: LabelTagParse,
    expect: Expect,
}

impl PairBuilder {
    fn error(&mut self, found: &str, offset: usize) {
        self.parse.errors.push(LabelTagError {
            expected: self.expect.describe(),
            found: found.to_string(),
            offset,
        });
    }

    fn value(&mut self, value: String, quoted: bool, offset: usize) {
        let value = if quoted {
            value
        } else {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return;
            }
            trimmed.to_string()
        };

        match self.expect {
            Expect::Label => {
                self.parse.pairs.push((value, Vec::new()));
                self.expect = Expect::Separator;
                return;
            }
            Expect::Separator | Expect::TagEnd => self.error(&value, offset),
            Expect::Tag => {}
        }
        if let Some((_, tags)) = self.parse.pairs.last_mut() {
            if !tags.contains(&value) {
                tags.push(value);
            }
        }
        self.expect = Expect::TagEnd;
    }

    fn separator(&mut self, offset: usize) {
        match self.expect {
            Expect::Separator => self.expect = Expect::Tag,
            _ => self.error(SEPARATOR, offset),
        }
    }

    fn tag_separator(&mut self, offset: usize) {
        match self.expect {
            Expect::Tag | Expect::TagEnd => self.expect = Expect::Tag,
            Expect::Separator => {
                self.error(TAG_SEPARATOR, offset);
                self.expect = Expect::Tag;
            }
            Expect::Label => self.error(TAG_SEPARATOR, offset),
        }
    }

    fn line_end(&mut self) {
        self.expect = Expect::Label;
    }
}

/// Parses label-tag text.
pub fn parse(text: &str) -> LabelTagParse {
    let mut tokenizer = Tokenizer::new(codec_config());
    tokenizer.attach(text);

    let mut builder = PairBuilder {
        parse: LabelTagParse::default(),
        expect: Expect::Label,
    };
    let mut in_comment = false;
    let mut quoting: Option<usize> = None;
    let mut payload: Option<(String, usize)> = None;

    while let Some(token) = tokenizer.next_token() {
        let offset = tokenizer.position() - token.len();

        if in_comment {
            if token == LINE_END {
                in_comment = false;
                builder.line_end();
            }
            continue;
        }

        if quoting.is_some() {
            if token == QUOTE {
                quoting = None;
                let (value, at) = payload.take().unwrap_or((String::new(), offset));
                builder.value(value, true, at);
            } else {
                payload = Some((unescape_payload(&token), offset));
            }
            continue;
        }

        match token.as_str() {
            QUOTE => quoting = Some(offset),
            COMMENT => in_comment = true,
            SEPARATOR => builder.separator(offset),
            TAG_SEPARATOR => builder.tag_separator(offset),
            LINE_END | FIELD_END => builder.line_end(),
            _ => builder.value(token, false, offset),
        }
    }

    if let Some(opened_at) = quoting {
        builder.parse.errors.push(LabelTagError {
            expected: "closing `\"\"\"`",
            found: QUOTE.to_string(),
            offset: opened_at,
        });
        if let Some((value, at)) = payload {
            builder.value(value, true, at);
        }
    }
    builder.parse
}

/// Serializes pairs, one line per pair.
pub fn serialize(pairs: &[(String, Vec<String>)]) -> String {
    pairs
        .iter()
        .map(|(label, tags)| serialize_line(label, tags))
        .collect()
}

/// Serializes one `label: tag, tag` line including its trailing newline.
pub fn serialize_line(label: &str, tags: &[String]) -> String {
    let mut line = quote_if_needed(label);
    line.push(':');
    if !tags.is_empty() {
        line.push(' ');
        let quoted: Vec<String> = tags.iter().map(|tag| quote_if_needed(tag)).collect();
        line.push_str(&quoted.join(", "));
    }
    line.push('\n');
    line
}

/// Wraps a value in `"""` when plain text would not read back unchanged.
pub fn quote_if_needed(value: &str) -> String {
    let needs_quote = value.is_empty()
        || value.trim() != value
        || RESERVED.iter().any(|reserved| value.contains(reserved));
    if needs_quote {
        format!("{QUOTE}{}{QUOTE}", escape_payload(value))
    } else {
        value.to_string()
    }
}

/// Merges repeated labels, keeping first-seen label order and tag order.
pub fn fold_pairs(pairs: impl IntoIterator<Item = (String, Vec<String>)>) -> LabelTagMap {
    let mut map = LabelTagMap::new();
    for (label, tags) in pairs {
        let merged = map.entry(label).or_default();
        for tag in tags {
            if !merged.contains(&tag) {
                merged.push(tag);
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(label: &str, tags: &[&str]) -> (String, Vec<String>) {
        (
            label.to_string(),
            tags.iter().map(|tag| (*tag).to_string()).collect(),
        )
    }

    #[test]
    fn parses_lines_and_fields() {
        let parsed = parse("label1: tag1, tag2\nlabel2: tag3; label3: tag4");
        assert!(parsed.is_clean());
        assert_eq!(
            parsed.pairs,
            vec![
                pair("label1", &["tag1", "tag2"]),
                pair("label2", &["tag3"]),
                pair("label3", &["tag4"]),
            ]
        );
    }

    #[test]
    fn comments_are_dropped_and_end_the_line() {
        let parsed = parse("a: x # note: ignored, really\nb: y\n# whole line\nc:");
        assert!(parsed.is_clean());
        assert_eq!(
            parsed.pairs,
            vec![pair("a", &["x"]), pair("b", &["y"]), pair("c", &[])]
        );
    }

    #[test]
    fn quoted_payload_is_verbatim() {
        let parsed = parse("title: \"\"\"Hello, world: again # not a comment\"\"\", plain");
        assert!(parsed.is_clean());
        assert_eq!(
            parsed.pairs,
            vec![pair(
                "title",
                &["Hello, world: again # not a comment", "plain"]
            )]
        );
    }

    #[test]
    fn tags_are_deduplicated_per_occurrence() {
        let parsed = parse("a: x, x, y\na: y, z");
        assert_eq!(parsed.pairs, vec![pair("a", &["x", "y"]), pair("a", &["y", "z"])]);
        let folded = parsed.into_map();
        assert_eq!(folded.len(), 1);
        assert_eq!(folded["a"], vec!["x", "y", "z"]);
    }

    #[test]
    fn bare_label_has_no_tags() {
        let parsed = parse("include_1");
        assert!(parsed.is_clean());
        assert_eq!(parsed.pairs, vec![pair("include_1", &[])]);
    }

    #[test]
    fn out_of_sequence_tokens_are_reported_but_kept() {
        let parsed = parse("a: x y\n: z");
        assert_eq!(parsed.pairs, vec![pair("a", &["x", "y"]), pair("z", &[])]);
        assert_eq!(parsed.errors.len(), 2);
        assert_eq!(parsed.errors[0].found, "y");
        assert_eq!(parsed.errors[0].offset, 5);
        assert_eq!(parsed.errors[1].expected, "a label");
    }

    #[test]
    fn serialize_quotes_reserved_values() {
        assert_eq!(
            serialize_line("title", &["a, b".to_string(), "plain".to_string()]),
            "title: \"\"\"a, b\"\"\", plain\n"
        );
        assert_eq!(serialize_line("empty", &[]), "empty:\n");
        assert_eq!(quote_if_needed(""), "\"\"\"\"\"\"");
        assert_eq!(
            quote_if_needed("say \"\"\"hi\"\"\""),
            "\"\"\"say \\\"\"\"hi\\\"\"\"\"\"\""
        );
    }

    #[test]
    fn serialize_then_parse_round_trips() {
        let pairs = vec![
            pair("title", &["say \"\"\"hi\"\"\" twice", "a,b", "plain", ""]),
            pair("brief", &["line one\nline two", " padded "]),
            pair("label with space", &["x"]),
            pair("end", &[]),
        ];
        let parsed = parse(&serialize(&pairs));
        assert!(parsed.is_clean(), "errors: {:?}", parsed.errors);
        assert_eq!(parsed.pairs, pairs);
    }

    #[test]
    fn backslashes_next_to_quotes_round_trip() {
        assert_eq!(quote_if_needed(r"C:\depot\"), r#""""C:\depot\\""""#);
        let pairs = vec![
            pair("location", &[r"C:\depot\", r"a\\, b", "ends with \"", r#"tail \""#]),
            pair("quote", &[r#"x\"""y"#, r#"z\\""""#, "\"\"\"\"", r#""""\""#]),
            pair("next", &["kept"]),
        ];
        let parsed = parse(&serialize(&pairs));
        assert!(parsed.is_clean(), "errors: {:?}", parsed.errors);
        assert_eq!(parsed.pairs, pairs);
    }

    #[test]
    fn unclosed_quote_is_reported() {
        let parsed = parse("a: x\nb: \"\"\"open, c: y");
        assert_eq!(parsed.pairs, vec![pair("a", &["x"]), pair("b", &["open, c: y"])]);
        assert_eq!(parsed.errors.len(), 1);
        assert_eq!(parsed.errors[0].offset, 8);
        assert!(parsed.errors[0].expected.contains("\"\"\""));
    }
}
