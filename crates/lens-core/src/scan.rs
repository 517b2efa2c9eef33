//! nom combinators over compiled host code.
//!
//! The engine never needs a full host-language parser. It needs to know
//! where a bracketed group ends, where a top-level statement or argument
//! ends, and what a string literal or array literal contains. Quoted strings
//! (`'...'` and `"..."`, with backslash escapes) are skipped as units so
//! brackets and separators inside them never count; comments are not.

use nom::{
    branch::alt,
    bytes::complete::{escaped, escaped_transform, is_not, tag, tag_no_case},
    character::complete::{anychar, char, multispace0, none_of},
    combinator::{all_consuming, map, opt, peek, recognize, rest, value},
    error::ParseError,
    multi::{many0_count, separated_list0},
    sequence::{delimited, pair, preceded, separated_pair},
    IResult,
};

type Error<'a> = nom::error::Error<&'a str>;

/// Characters that end a run of plain code inside a group.
const INNER: &str = "()[]{}'\"";
/// ... inside an argument or array item.
const ITEM: &str = "()[]{}'\",";
/// ... inside a statement.
const STATEMENT: &str = "()[]{}'\";";

// ============================================================================
// Combinators
// ============================================================================

/// A quoted string, recognized but not decoded.
fn quoted<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    recognize(alt((
        delimited(
            char('\''),
            opt(escaped(none_of("'\\"), '\\', anychar)),
            char('\''),
        ),
        delimited(
            char('"'),
            opt(escaped(none_of("\"\\"), '\\', anychar)),
            char('"'),
        ),
    )))(input)
}

/// A balanced `(...)`, `[...]` or `{...}` group.
fn group<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    recognize(alt((
        delimited(char('('), code(INNER), char(')')),
        delimited(char('['), code(INNER), char(']')),
        delimited(char('{'), code(INNER), char('}')),
    )))(input)
}

/// Code up to the first unmatched closing bracket or top-level `stops` char.
fn code<'a, E: ParseError<&'a str>>(
    stops: &'static str,
) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str, E> {
    move |input| recognize(many0_count(alt((quoted, group, is_not(stops)))))(input)
}

/// `'...'`: only `\'` and `\\` are escapes, any other backslash is literal.
fn single_quoted<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, String, E> {
    delimited(
        char('\''),
        map(
            opt(escaped_transform(
                none_of("'\\"),
                '\\',
                alt((
                    value('\'', char('\'')),
                    value('\\', char('\\')),
                    value('\\', peek(anychar)),
                )),
            )),
            Option::unwrap_or_default,
        ),
        char('\''),
    )(input)
}

/// `"..."` without interpolation; an unescaped `$` fails the parse.
fn double_quoted<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, String, E> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                none_of("\"\\$"),
                '\\',
                alt((
                    value('\n', char('n')),
                    value('\r', char('r')),
                    value('\t', char('t')),
                    value('\\', char('\\')),
                    value('"', char('"')),
                    value('$', char('$')),
                    value('\\', peek(anychar)),
                )),
            )),
            Option::unwrap_or_default,
        ),
        char('"'),
    )(input)
}

fn php_string<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, String, E> {
    alt((single_quoted, double_quoted))(input)
}

/// Inner text of `[...]` or `array(...)`.
fn array_body<'a, E: ParseError<&'a str>>(input: &'a str) -> IResult<&'a str, &'a str, E> {
    alt((
        delimited(char('['), code(INNER), char(']')),
        preceded(
            pair(tag_no_case("array"), multispace0),
            delimited(char('('), code(INNER), char(')')),
        ),
    ))(input)
}

/// `'key' => expr`
fn keyed_entry<'a, E: ParseError<&'a str>>(
    input: &'a str,
) -> IResult<&'a str, (String, &'a str), E> {
    preceded(
        multispace0,
        separated_pair(php_string, delimited(multispace0, tag("=>"), multispace0), rest),
    )(input)
}

// ============================================================================
// Public API
// ============================================================================

/// Index of the bracket closing the one at `open`.
///
/// Returns `None` when `open` is not an opening bracket or the text ends
/// before the brackets balance.
pub fn matching_close(text: &str, open: usize) -> Option<usize> {
    let (_, matched) = group::<Error>(text.get(open..)?).ok()?;
    Some(open + matched.len() - 1)
}

/// Length of the statement at the start of `text`, excluding its `;`.
pub fn statement_len(text: &str) -> usize {
    code::<Error>(STATEMENT)(text)
        .map(|(_, statement)| statement.len())
        .unwrap_or(text.len())
}

/// Split a balanced argument list or array body at its top-level commas.
///
/// Returns `None` when the text does not balance.
pub fn split_items(text: &str) -> Option<Vec<&str>> {
    all_consuming(separated_list0(char(','), code::<Error>(ITEM)))(text)
        .ok()
        .map(|(_, items)| items)
}

/// Decode a single PHP string literal.
///
/// Returns `None` for anything that is not exactly one literal: concatenations,
/// double-quoted strings with `$` interpolation, variables, calls.
pub fn string_literal(text: &str) -> Option<String> {
    all_consuming(delimited(multispace0, php_string::<Error>, multispace0))(text)
        .ok()
        .map(|(_, s)| s)
}

/// Inner text of `[...]` or `array(...)`, if `text` is exactly one array literal.
pub fn array_literal(text: &str) -> Option<&str> {
    all_consuming(delimited(multispace0, array_body::<Error>, multispace0))(text)
        .ok()
        .map(|(_, inner)| inner)
}

/// Split one array item into its literal key and trimmed value expression.
pub fn keyed_item(item: &str) -> Option<(String, &str)> {
    keyed_entry::<Error>(item)
        .ok()
        .map(|(_, (key, expr))| (key, expr.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_close_skips_strings() {
        let text = "make('a)b', [1, (2)])->render()";
        let open = text.find('(').unwrap();
        let close = matching_close(text, open).unwrap();
        assert_eq!(&text[close..], ")->render()");
    }

    #[test]
    fn test_matching_close_unbalanced() {
        assert_eq!(matching_close("(a, (b)", 0), None);
        assert_eq!(matching_close("(a]", 0), None);
        assert_eq!(matching_close("abc", 0), None);
        assert_eq!(matching_close("(", 5), None);
    }

    #[test]
    fn test_matching_close_after_multibyte() {
        let text = "e($café, 'ü)')";
        assert_eq!(matching_close(text, 1), Some(text.len() - 1));
    }

    #[test]
    fn test_split_items_respects_nesting() {
        let parts = split_items("'x', ['a' => f(1, 2)], 'y,z'").unwrap();
        assert_eq!(parts, vec!["'x'", " ['a' => f(1, 2)]", " 'y,z'"]);
        assert_eq!(split_items(""), Some(vec![""]));
        assert_eq!(split_items("a, (b"), None);
    }

    #[test]
    fn test_statement_len() {
        assert_eq!(statement_len("$users; foreach"), 6);
        assert_eq!(statement_len("f(';'); x"), 6);
        assert_eq!(statement_len("$open"), 5);
    }

    #[test]
    fn test_string_literal_forms() {
        assert_eq!(string_literal("'welcome'"), Some("welcome".into()));
        assert_eq!(string_literal(" \"users.show\" "), Some("users.show".into()));
        assert_eq!(string_literal(r"'it\'s'"), Some("it's".into()));
        assert_eq!(string_literal(r"'a\b'"), Some(r"a\b".into()));
        assert_eq!(string_literal(r#""tab\there""#), Some("tab\there".into()));
        assert_eq!(string_literal("''"), Some(String::new()));
        assert_eq!(string_literal("'café'"), Some("café".into()));
        assert_eq!(string_literal("'a' . 'b'"), None);
        assert_eq!(string_literal("\"hello $name\""), None);
        assert_eq!(string_literal("$view"), None);
        assert_eq!(string_literal("'"), None);
    }

    #[test]
    fn test_array_literal_forms() {
        assert_eq!(array_literal("['a' => 1]"), Some("'a' => 1"));
        assert_eq!(array_literal("array('a' => 1)"), Some("'a' => 1"));
        assert_eq!(array_literal("ARRAY ( )"), Some(" "));
        assert_eq!(array_literal("['a'] + ['b']"), None);
        assert_eq!(array_literal("array_merge($a, $b)"), None);
        assert_eq!(array_literal("$data"), None);
    }

    #[test]
    fn test_array_literal_non_ascii_expression() {
        assert_eq!(array_literal("$café"), None);
        assert_eq!(array_literal("$éé"), None);
        assert_eq!(array_literal("['ü' => $café]"), Some("'ü' => $café"));
    }

    #[test]
    fn test_keyed_item() {
        assert_eq!(keyed_item(" 'a' => f(1, 2) "), Some(("a".into(), "f(1, 2)")));
        assert_eq!(keyed_item("\"b\"=>$x"), Some(("b".into(), "$x")));
        assert_eq!(keyed_item("$key => 1"), None);
        assert_eq!(keyed_item("$positional"), None);
    }
}
