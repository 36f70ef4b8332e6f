//! S-expression reader: source text -> cell trees.
//!
//! Accepts integers, reals, symbols, proper lists, dotted pairs, the quote
//! shorthand `'expr`, and `;` line comments. The reader produces plain cell
//! trees; all special-form dispatch happens later, in the evaluator.
//! Nesting is bounded by [`MAX_PARSE_DEPTH`] so hostile input cannot drive
//! the recursive descent arbitrarily deep.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    combinator::{opt, recognize},
    error::ErrorKind,
};

use crate::cell::Cell;
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Allowed non-alphanumeric characters in symbol names.
const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$";

/// Valid: non-empty, no leading digit, no "-digit" prefix, alphanumeric
/// plus [`SYMBOL_SPECIAL_CHARS`].
fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        None => false,
        Some(first) => {
            if first.is_ascii_digit() {
                return false;
            }
            if first == '-' && chars.next().is_some_and(|c| c.is_ascii_digit()) {
                return false;
            }
            name.chars()
                .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
        }
    }
}

/// Skip whitespace and `;` line comments.
fn skip_ws(input: &str) -> &str {
    let mut rest = input.trim_start();
    while let Some(comment) = rest.strip_prefix(';') {
        rest = match comment.find('\n') {
            Some(pos) => &comment[pos + 1..],
            None => "",
        };
        rest = rest.trim_start();
    }
    rest
}

/// True when the atom just parsed is properly delimited at `rest`.
fn ends_token(rest: &str) -> bool {
    rest.chars()
        .next()
        .map_or(true, |c| c.is_whitespace() || c == '(' || c == ')' || c == ';')
}

fn parse_exponent(input: &str) -> IResult<&str, &str> {
    recognize((
        alt((char('e'), char('E'))),
        opt(alt((char('+'), char('-')))),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)
}

/// A real needs a decimal point or an exponent; plain digit runs stay
/// integers.
fn parse_real(input: &str) -> IResult<&str, Cell> {
    let (rest, text) = recognize((
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
        alt((
            recognize((
                char('.'),
                take_while(|c: char| c.is_ascii_digit()),
                opt(parse_exponent),
            )),
            recognize(parse_exponent),
        )),
    ))
    .parse(input)?;

    match text.parse::<f64>() {
        Ok(value) if ends_token(rest) => Ok((rest, Cell::Real(value))),
        _ => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Float,
        ))),
    }
}

fn parse_integer(input: &str) -> IResult<&str, Cell> {
    let (rest, text) = recognize((
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)?;

    match text.parse::<i64>() {
        Ok(value) if ends_token(rest) => Ok((rest, Cell::Integer(value))),
        _ => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        ))),
    }
}

fn parse_symbol(input: &str) -> IResult<&str, Cell> {
    let (rest, candidate) =
        take_while1(|c: char| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
            .parse(input)?;

    if is_valid_symbol(candidate) && ends_token(rest) {
        Ok((rest, Cell::symbol(candidate)))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Alpha,
        )))
    }
}

/// Parse the elements of a list after the opening parenthesis, including an
/// optional ` . tail` before the closing one.
fn parse_list(input: &str, depth: usize) -> IResult<&str, Cell> {
    let (input, _) = char('(').parse(input)?;
    let mut rest = skip_ws(input);

    let mut elements = Vec::new();
    let mut dotted_tail = None;

    loop {
        if let Some(after) = rest.strip_prefix(')') {
            rest = after;
            break;
        }

        // A lone `.` after at least one element introduces the tail of an
        // improper list; `.` never starts an atom, so there is no ambiguity.
        if let Some(after_dot) = rest.strip_prefix('.') {
            if ends_token(after_dot) && !elements.is_empty() {
                let (after, tail) = parse_expr(skip_ws(after_dot), depth + 1)?;
                let after = skip_ws(after);
                match after.strip_prefix(')') {
                    Some(after) => {
                        rest = after;
                        dotted_tail = Some(tail);
                        break;
                    }
                    None => {
                        return Err(nom::Err::Error(nom::error::Error::new(
                            after,
                            ErrorKind::Char,
                        )));
                    }
                }
            }
        }

        let (after, element) = parse_expr(rest, depth + 1)?;
        elements.push(element);
        rest = skip_ws(after);
    }

    let mut cell = dotted_tail.unwrap_or(Cell::Empty);
    for element in elements.into_iter().rev() {
        cell = Cell::cons(element, cell);
    }
    Ok((rest, cell))
}

fn parse_expr(input: &str, depth: usize) -> IResult<&str, Cell> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }

    if let Some(rest) = input.strip_prefix('\'') {
        let (rest, quoted) = parse_expr(rest, depth + 1)?;
        return Ok((rest, Cell::list(vec![Cell::symbol("quote"), quoted])));
    }
    if input.starts_with('(') {
        return parse_list(input, depth);
    }
    alt((parse_real, parse_integer, parse_symbol)).parse(input)
}

/// Translate a nom failure into the crate error type, pointing at the spot
/// in the original input.
fn read_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> Error {
    let parse_error = match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = input.len().saturating_sub(e.input.len());
            if e.code == ErrorKind::TooLarge {
                ParseError::new(
                    ParseErrorKind::TooDeeplyNested,
                    format!("expression nested deeper than {MAX_PARSE_DEPTH} levels"),
                )
            } else if offset >= input.len() {
                ParseError::with_context(
                    ParseErrorKind::Incomplete,
                    "unexpected end of input",
                    input,
                    offset,
                )
            } else {
                ParseError::with_context(
                    ParseErrorKind::InvalidSyntax,
                    format!("invalid syntax at offset {offset}"),
                    input,
                    offset,
                )
            }
        }
        nom::Err::Incomplete(_) => ParseError::new(ParseErrorKind::Incomplete, "incomplete input"),
    };
    Error::ReadError(parse_error)
}

/// Parse exactly one complete expression; trailing input is an error.
pub fn parse_form(input: &str) -> Result<Cell, Error> {
    let (rest, cell) = parse_expr(skip_ws(input), 0).map_err(|e| read_error(input, e))?;
    let rest = skip_ws(rest);
    if !rest.is_empty() {
        return Err(Error::ReadError(ParseError::with_context(
            ParseErrorKind::TrailingContent,
            "unexpected input after a complete expression",
            input,
            input.len() - rest.len(),
        )));
    }
    Ok(cell)
}

/// Parse a whole source text into its sequence of top-level forms.
pub fn parse_forms(input: &str) -> Result<Vec<Cell>, Error> {
    let mut forms = Vec::new();
    let mut rest = skip_ws(input);
    while !rest.is_empty() {
        let (after, cell) = parse_expr(rest, 0).map_err(|e| read_error(input, e))?;
        forms.push(cell);
        rest = skip_ws(after);
    }
    Ok(forms)
}
