use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, ParseError, ParseErrorKind};
use crate::model::{Entry, ParseResult, QuoteKind};
use crate::repository::Repository;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Parse dotenv text without consulting any live environment.
///
/// Placeholders that do not name an earlier entry resolve to the empty string.
pub fn parse_str(input: &str) -> ParseResult {
    parse_with_lookup(input, None, &|_| None)
}

/// Parse dotenv text, resolving placeholders that do not name an earlier entry
/// through `repository`.
pub fn parse_str_with_env(input: &str, repository: &Repository) -> ParseResult {
    parse_with_lookup(input, None, &|name| repository.read(name))
}

/// Parse dotenv entries from UTF-8 bytes.
pub fn parse_bytes(input: &[u8]) -> Result<ParseResult, Error> {
    let text = std::str::from_utf8(input)?;
    Ok(parse_str(text))
}

pub(crate) fn parse_with_lookup(
    input: &str,
    path: Option<&Path>,
    lookup: &dyn Fn(&str) -> Option<String>,
) -> ParseResult {
    let input = input.strip_prefix(BYTE_ORDER_MARK).unwrap_or(input);
    let normalized = normalize_newlines(input);

    let mut result = ParseResult {
        path: path.map(Path::to_path_buf),
        ..ParseResult::default()
    };
    let mut by_name = HashMap::<String, usize>::new();
    let mut resolver = Resolver::new(lookup);
    let mut lexer = Lexer::new(normalized.as_ref());

    while let Some((line, statement)) = lexer.next_statement() {
        let raw = match statement {
            Ok(Statement::Blank) => {
                result.skipped_lines.push(line);
                continue;
            }
            Ok(Statement::Entry(raw)) => raw,
            Err(err) => {
                let err = err.with_path(path);
                tracing::warn!(%err, content = %err.content, "skipping malformed dotenv line");
                result.errors.push(err);
                continue;
            }
        };

        let entry = resolver.resolve(raw, line);
        if let Some(existing_idx) = by_name.get(&entry.name).copied() {
            result.entries[existing_idx] = entry;
        } else {
            by_name.insert(entry.name.clone(), result.entries.len());
            result.entries.push(entry);
        }
    }

    result
}

fn normalize_newlines(input: &str) -> Cow<'_, str> {
    if !input.contains('\r') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\r' {
            out.push('\n');
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            continue;
        }
        out.push(ch);
    }

    Cow::Owned(out)
}

enum Statement<'a> {
    Blank,
    Entry(RawEntry<'a>),
}

struct RawEntry<'a> {
    name: &'a str,
    value: RawValue<'a>,
    exported: bool,
}

enum RawValue<'a> {
    Unquoted(&'a str),
    Single(&'a str),
    Double(&'a str),
}

/// Splits normalized text into logical statements.
///
/// A statement is one physical line, or several when a quoted value spans
/// newlines.
struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: u32,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
        }
    }

    fn next_statement(&mut self) -> Option<(u32, Result<Statement<'a>, ParseError>)> {
        if self.pos >= self.input.len() {
            return None;
        }

        let start = self.pos;
        let line = self.line;
        let line_end = self.line_end(start);
        let physical = &self.input[start..line_end];
        let working = physical.trim_start();

        if working.is_empty() || working.starts_with('#') {
            self.advance_to(line_end);
            return Some((line, Ok(Statement::Blank)));
        }

        let (statement, end) = match self.lex_entry(start, line_end, line) {
            Ok((entry, end)) => (Ok(Statement::Entry(entry)), end),
            Err((err, resume)) => (Err(err), resume),
        };
        self.advance_to(end);
        Some((line, statement))
    }

    fn lex_entry(
        &self,
        start: usize,
        line_end: usize,
        line: u32,
    ) -> Result<(RawEntry<'a>, usize), (ParseError, usize)> {
        let input = self.input;
        let physical = &input[start..line_end];
        let column_of = |rest: &str| (physical.len() - rest.len()) as u32 + 1;
        let fail = |column: u32, kind: ParseErrorKind| {
            Err((ParseError::new(line, column, kind, physical), line_end))
        };

        let mut working = physical.trim_start();
        let mut exported = false;
        if let Some(rest) = working.strip_prefix("export")
            && rest.starts_with([' ', '\t'])
        {
            working = rest.trim_start();
            exported = true;
        }

        let Some(eq_idx) = working.find('=') else {
            return fail(column_of(""), ParseErrorKind::InvalidSyntax);
        };

        let name = working[..eq_idx].trim();
        if name.is_empty() {
            return fail(column_of(working), ParseErrorKind::MissingName);
        }
        if !is_valid_name(name) {
            return fail(column_of(working), ParseErrorKind::InvalidName);
        }

        let value_input = working[eq_idx + 1..].trim_start();
        let value_start = start + (physical.len() - value_input.len());

        let (value, end) = match value_input.as_bytes().first() {
            Some(quote @ (b'\'' | b'"')) => {
                let (body, end) = self.lex_quoted(value_start, *quote, start, line)?;
                let value = if *quote == b'"' {
                    RawValue::Double(body)
                } else {
                    RawValue::Single(body)
                };
                (value, end)
            }
            _ => (
                RawValue::Unquoted(strip_inline_comment(value_input).trim_end()),
                line_end,
            ),
        };

        Ok((
            RawEntry {
                name,
                value,
                exported,
            },
            end,
        ))
    }

    /// Finds the closing quote for the value opening at `open`, possibly on a
    /// later line, and checks that only a comment follows it.
    fn lex_quoted(
        &self,
        open: usize,
        quote: u8,
        start: usize,
        line: u32,
    ) -> Result<(&'a str, usize), (ParseError, usize)> {
        let input = self.input;
        let bytes = input.as_bytes();
        let close = (open + 1..bytes.len())
            .find(|idx| bytes[*idx] == quote && !is_preceded_by_odd_backslashes(bytes, *idx));

        let Some(close) = close else {
            let physical = &input[start..self.line_end(start)];
            let column = (open - start) as u32 + 1;
            return Err((
                ParseError::new(line, column, ParseErrorKind::UnterminatedQuote, physical),
                input.len(),
            ));
        };

        let tail_end = self.line_end(close + 1);
        let tail = input[close + 1..tail_end].trim_start();
        if !tail.is_empty() && !tail.starts_with('#') {
            let line_start = input[..close].rfind('\n').map_or(0, |idx| idx + 1);
            let close_line = line + input[start..close].matches('\n').count() as u32;
            let column = (tail_end - tail.len() - line_start) as u32 + 1;
            return Err((
                ParseError::new(
                    close_line,
                    column,
                    ParseErrorKind::InvalidSyntax,
                    &input[line_start..tail_end],
                ),
                tail_end,
            ));
        }

        Ok((&input[open + 1..close], tail_end))
    }

    fn line_end(&self, from: usize) -> usize {
        self.input[from..]
            .find('\n')
            .map_or(self.input.len(), |idx| from + idx)
    }

    /// Moves past `end` and the newline following it, keeping the line count.
    fn advance_to(&mut self, end: usize) {
        self.line += self.input[self.pos..end].matches('\n').count() as u32;
        self.pos = end;
        if self.input.as_bytes().get(self.pos) == Some(&b'\n') {
            self.pos += 1;
            self.line += 1;
        }
    }
}

fn is_preceded_by_odd_backslashes(bytes: &[u8], idx: usize) -> bool {
    let mut cursor = idx;
    let mut backslash_count = 0usize;
    while cursor > 0 && bytes[cursor - 1] == b'\\' {
        cursor -= 1;
        backslash_count += 1;
    }

    backslash_count % 2 == 1
}

fn strip_inline_comment(value: &str) -> &str {
    let bytes = value.as_bytes();
    bytes
        .iter()
        .enumerate()
        .find(|(idx, byte)| **byte == b'#' && !is_preceded_by_odd_backslashes(bytes, *idx))
        .map_or(value, |(idx, _)| &value[..idx])
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.')
}

/// Turns raw statements into entries, tracking values resolved so far in the
/// current pass.
struct Resolver<'l> {
    resolved: HashMap<String, String>,
    lookup: &'l dyn Fn(&str) -> Option<String>,
}

impl<'l> Resolver<'l> {
    fn new(lookup: &'l dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            resolved: HashMap::new(),
            lookup,
        }
    }

    fn resolve(&mut self, raw: RawEntry<'_>, line: u32) -> Entry {
        let (value, quote) = match raw.value {
            RawValue::Unquoted(value) => (value.to_owned(), QuoteKind::None),
            RawValue::Single(value) => (value.to_owned(), QuoteKind::Single),
            RawValue::Double(body) => (self.expand_double_quoted(body), QuoteKind::Double),
        };

        self.resolved.insert(raw.name.to_owned(), value.clone());
        Entry {
            name: raw.name.to_owned(),
            value,
            quote,
            exported: raw.exported,
            line,
        }
    }

    /// Earlier entries first, then the live environment, then empty.
    fn resolve_name(&self, name: &str) -> String {
        if let Some(value) = self.resolved.get(name) {
            return value.clone();
        }
        (self.lookup)(name).unwrap_or_default()
    }

    fn expand_double_quoted(&self, body: &str) -> String {
        let mut out = String::with_capacity(body.len());
        let mut chars = body.char_indices().peekable();

        while let Some((idx, ch)) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some((_, 'n')) => out.push('\n'),
                    Some((_, 'r')) => out.push('\r'),
                    Some((_, 't')) => out.push('\t'),
                    Some((_, escaped @ ('\\' | '"' | '$'))) => out.push(escaped),
                    Some((_, other)) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => out.push('\\'),
                },
                '$' => {
                    let Some(placeholder) = parse_placeholder(body, idx) else {
                        out.push('$');
                        continue;
                    };
                    out.push_str(&self.resolve_name(&body[placeholder.name]));
                    while chars
                        .peek()
                        .is_some_and(|(next, _)| *next < placeholder.end)
                    {
                        chars.next();
                    }
                }
                _ => out.push(ch),
            }
        }

        out
    }
}

struct Placeholder {
    name: std::ops::Range<usize>,
    end: usize,
}

/// Recognizes `${NAME}` or `$NAME` starting at the `$` at `start`.
fn parse_placeholder(input: &str, start: usize) -> Option<Placeholder> {
    let bytes = input.as_bytes();
    let next = *bytes.get(start + 1)?;

    if next == b'{' {
        let name_start = start + 2;
        let close = name_start + input[name_start..].find('}')?;
        if !is_valid_name(&input[name_start..close]) {
            return None;
        }

        return Some(Placeholder {
            name: name_start..close,
            end: close + 1,
        });
    }

    if !(next.is_ascii_alphabetic() || next == b'_') {
        return None;
    }

    let name_start = start + 1;
    let name_end = bytes[name_start..]
        .iter()
        .position(|byte| !(byte.is_ascii_alphanumeric() || *byte == b'_'))
        .map_or(bytes.len(), |len| name_start + len);

    Some(Placeholder {
        name: name_start..name_end,
        end: name_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(result: &ParseResult) -> Vec<(&str, &str)> {
        result
            .entries
            .iter()
            .map(|entry| (entry.name.as_str(), entry.value.as_str()))
            .collect()
    }

    fn only_error(input: &str) -> ParseError {
        let result = parse_str(input);
        assert_eq!(result.errors.len(), 1, "errors: {:?}", result.errors);
        result.errors.into_iter().next().expect("one error")
    }

    #[test]
    fn parses_basic_values_and_comments() {
        let input = "A=1\nB = 2\n# skip\nC=hello # comment\nD=\n";
        let result = parse_str(input);

        assert!(result.is_clean());
        assert_eq!(
            values(&result),
            vec![("A", "1"), ("B", "2"), ("C", "hello"), ("D", "")]
        );
        assert_eq!(result.skipped_lines, vec![3]);
    }

    #[test]
    fn unquoted_value_drops_trailing_comment_and_whitespace() {
        let result = parse_str("NAME=value  # comment\nHASH=a#b\nKEPT=a\\#b   \n");

        assert_eq!(result.get("NAME"), Some("value"));
        assert_eq!(result.get("HASH"), Some("a"));
        assert_eq!(result.get("KEPT"), Some("a\\#b"));
    }

    #[test]
    fn parses_export_and_quote_kinds() {
        let input = "export QUOTED=\"line\\nvalue\"\nSINGLE='raw value'\nPLAIN=plain\n";
        let result = parse_str(input);

        let quoted = &result.entries[0];
        assert_eq!(quoted.name, "QUOTED");
        assert_eq!(quoted.value, "line\nvalue");
        assert_eq!(quoted.quote, QuoteKind::Double);
        assert!(quoted.exported);

        assert_eq!(result.entries[1].quote, QuoteKind::Single);
        assert!(!result.entries[1].exported);
        assert_eq!(result.entries[2].quote, QuoteKind::None);
    }

    #[test]
    fn export_is_a_plain_name_without_trailing_whitespace() {
        let result = parse_str("export=1\nexported_value=2\n");
        assert_eq!(values(&result), vec![("export", "1"), ("exported_value", "2")]);
        assert!(result.entries.iter().all(|entry| !entry.exported));
    }

    #[test]
    fn single_quotes_are_never_escape_processed() {
        let result = parse_str("B=set\nA='$B\\n'\n");
        assert_eq!(result.get("A"), Some("$B\\n"));
    }

    #[test]
    fn double_quotes_process_escapes() {
        let result = parse_str(r#"A="tab\there \"q\" back\\slash \$NOPE \x""#);
        assert_eq!(
            result.get("A"),
            Some("tab\there \"q\" back\\slash $NOPE \\x")
        );
    }

    #[test]
    fn double_quotes_interpolate_earlier_entries() {
        let result = parse_str("A=hello\nB=\"${A} world\"\nC=\"$A-$B\"\n");

        assert_eq!(result.get("B"), Some("hello world"));
        assert_eq!(result.get("C"), Some("hello-hello world"));
    }

    #[test]
    fn unquoted_values_are_not_interpolated() {
        let result = parse_str("A=hello\nB=${A}-$A\n");
        assert_eq!(result.get("B"), Some("${A}-$A"));
    }

    #[test]
    fn self_and_forward_references_resolve_to_empty() {
        let result = parse_str("A=\"${A}\"\nB=\"[$C]\"\nC=later\n");

        assert_eq!(result.get("A"), Some(""));
        assert_eq!(result.get("B"), Some("[]"));
    }

    #[test]
    fn reassignment_can_reference_previous_value() {
        let result = parse_str("PATH_LIKE=/bin\nPATH_LIKE=\"${PATH_LIKE}:/usr/bin\"\n");
        assert_eq!(values(&result), vec![("PATH_LIKE", "/bin:/usr/bin")]);
    }

    #[test]
    fn lookup_falls_back_after_local_entries() {
        let lookup = |name: &str| (name == "HOME" || name == "A").then(|| format!("live-{name}"));
        let result = parse_with_lookup("A=local\nB=\"$A:$HOME:$NONE\"\n", None, &lookup);

        assert_eq!(result.get("B"), Some("local:live-HOME:"));
    }

    #[test]
    fn invalid_placeholders_stay_literal() {
        let result = parse_str("A=\"cost $5 ${ } ${open $\"\n");
        assert_eq!(result.get("A"), Some("cost $5 ${ } ${open $"));
    }

    #[test]
    fn dotted_names_are_allowed_in_braces() {
        let result = parse_str("app.name=demo\nA=\"${app.name}/$app.name\"\n");
        assert_eq!(result.get("A"), Some("demo/.name"));
    }

    #[test]
    fn duplicate_names_keep_last() {
        let result = parse_str("A=1\nB=x\nA=2\n");
        assert_eq!(values(&result), vec![("A", "2"), ("B", "x")]);
        assert_eq!(result.entries[0].line, 3);
    }

    #[test]
    fn whitespace_inside_quotes_is_preserved() {
        let result = parse_str("A=\"  padded  \"\nB='  also  '  # note\n");
        assert_eq!(result.get("A"), Some("  padded  "));
        assert_eq!(result.get("B"), Some("  also  "));
    }

    #[test]
    fn parses_multiline_quoted_values() {
        let input = "MULTI_DOUBLE=\"THIS\nIS\nA\nMULTILINE\nSTRING\"\n\
                     MULTI_SINGLE='THIS\nIS\nA\nMULTILINE\nSTRING'\n\
                     AFTER=after\n";
        let result = parse_str(input);

        assert!(result.is_clean());
        assert_eq!(result.get("MULTI_DOUBLE"), Some("THIS\nIS\nA\nMULTILINE\nSTRING"));
        assert_eq!(result.get("MULTI_SINGLE"), Some("THIS\nIS\nA\nMULTILINE\nSTRING"));
        assert_eq!(result.get("AFTER"), Some("after"));
        assert_eq!(result.entries[2].line, 11);
    }

    #[test]
    fn apostrophe_in_unquoted_value_does_not_open_a_quote() {
        let result = parse_str("A=it's\nB=ok\n");
        assert_eq!(values(&result), vec![("A", "it's"), ("B", "ok")]);
    }

    #[test]
    fn parses_double_quoted_value_ending_with_escaped_backslash() {
        let result = parse_str("DIR=\"C:\\\\Users\\\\\"\nNEXT=ok\n");
        assert_eq!(result.get("DIR"), Some("C:\\Users\\"));
        assert_eq!(result.get("NEXT"), Some("ok"));
    }

    #[test]
    fn keeps_escaped_single_quotes_inside_single_quotes() {
        let result = parse_str("A='this is \\'quoted\\''\n");
        assert_eq!(result.get("A"), Some("this is \\'quoted\\'"));
    }

    #[test]
    fn parses_comment_after_multiline_quote() {
        let result = parse_str("A=\"line 1\nline 2\" # trailing comment\nB=2\n");
        assert_eq!(values(&result), vec![("A", "line 1\nline 2"), ("B", "2")]);
    }

    #[test]
    fn strips_bom_and_normalizes_crlf() {
        let result = parse_str("\u{feff}A=\"line1\r\nline2\"\r\nB=ok\r\n");
        assert_eq!(values(&result), vec![("A", "line1\nline2"), ("B", "ok")]);
    }

    #[test]
    fn parses_unicode_values() {
        let result = parse_str("GREETING=こんにちは\n");
        assert_eq!(result.get("GREETING"), Some("こんにちは"));
    }

    #[test]
    fn reports_invalid_name() {
        for input in ["BAD NAME=value\n", "1ABC=value\n", "A-B=value\n"] {
            let err = only_error(input);
            assert_eq!(err.kind, ParseErrorKind::InvalidName, "input: {input:?}");
        }
    }

    #[test]
    fn reports_missing_name() {
        let err = only_error("   =value\n");
        assert_eq!(err.kind, ParseErrorKind::MissingName);
        assert_eq!(err.column, 4);
    }

    #[test]
    fn reports_missing_equals_sign() {
        let err = only_error("A=ok\nBAD LINE\n");
        assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
        assert_eq!(err.line, 2);
        assert_eq!(err.content, "BAD LINE");
    }

    #[test]
    fn reports_junk_after_closing_quote() {
        let err = only_error("A=\"one\ntwo\" three\n");
        assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 6);
        assert_eq!(err.content, "two\" three");
    }

    #[test]
    fn reports_unterminated_quote() {
        let result = parse_str("A=ok\nB=\"value\nC=never\n");

        assert_eq!(values(&result), vec![("A", "ok")]);
        assert_eq!(result.errors.len(), 1);
        let err = &result.errors[0];
        assert_eq!(err.kind, ParseErrorKind::UnterminatedQuote);
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 3);
    }

    #[test]
    fn bad_lines_are_skipped_and_parsing_continues() {
        let result = parse_str("A=1\nNOPE\nB=\"$A\"\n");

        assert!(!result.is_clean());
        assert_eq!(values(&result), vec![("A", "1"), ("B", "1")]);
        let err = result.into_entries().expect_err("expected parse error");
        assert_eq!(err.line, 2);
    }

    #[test]
    fn parse_bytes_rejects_invalid_utf8() {
        let err = parse_bytes(b"A=\xff\n").expect_err("expected encoding error");
        assert!(matches!(err, Error::InvalidEncoding(_)));
    }
}
