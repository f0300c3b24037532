//! Strict parser for serialized lineup-id lists.
//!
//! The predictions file stores each projected lineup as list literal text,
//! e.g. `[660271, 592450]` or `['660271', '592450']`. Only a flat list of
//! scalar tokens is accepted; anything else is rejected and the caller treats
//! the lineup as absent.

use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

use super::models::normalize_player_id;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineupParseError {
    #[error("lineup must be a bracketed list")]
    NotAList,
    #[error("element {0} is not a scalar")]
    NonScalar(usize),
    #[error("element {0} is empty")]
    EmptyElement(usize),
    #[error("unterminated quoted element {0}")]
    UnterminatedQuote(usize),
    #[error("invalid token {0:?}")]
    InvalidToken(String),
}

/// Parse lineup text into canonical player ids (see [`normalize_player_id`]).
pub fn parse_lineup_ids(text: &str) -> Result<Vec<String>, LineupParseError> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or(LineupParseError::NotAList)?;

    let mut ids = Vec::new();
    let mut chars = inner.chars().peekable();
    let mut position = 0usize;

    loop {
        skip_whitespace(&mut chars);
        let token = match chars.peek().copied() {
            // Empty list, or a trailing comma after the last element
            None => break,
            Some(quote @ ('\'' | '"')) => {
                chars.next();
                quoted_token(&mut chars, quote, position)?
            }
            Some('[' | ']' | '(' | ')' | '{' | '}') => {
                return Err(LineupParseError::NonScalar(position))
            }
            Some(',') => return Err(LineupParseError::EmptyElement(position)),
            Some(_) => bare_token(&mut chars)?,
        };
        if token.trim().is_empty() {
            return Err(LineupParseError::EmptyElement(position));
        }
        ids.push(normalize_player_id(&token));

        skip_whitespace(&mut chars);
        match chars.next() {
            None => break,
            Some(',') => position += 1,
            Some(c) => return Err(LineupParseError::InvalidToken(c.to_string())),
        }
    }

    Ok(ids)
}

fn skip_whitespace(chars: &mut Peekable<Chars<'_>>) {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
}

fn quoted_token(
    chars: &mut Peekable<Chars<'_>>,
    quote: char,
    position: usize,
) -> Result<String, LineupParseError> {
    let mut token = String::new();
    loop {
        match chars.next() {
            Some(c) if c == quote => return Ok(token),
            Some('\\') => return Err(LineupParseError::InvalidToken("\\".to_string())),
            Some(c) => token.push(c),
            None => return Err(LineupParseError::UnterminatedQuote(position)),
        }
    }
}

/// Unquoted elements must be plain numbers; bare words are never accepted.
fn bare_token(chars: &mut Peekable<Chars<'_>>) -> Result<String, LineupParseError> {
    let mut token = String::new();
    while let Some(c) = chars.next_if(|c| *c != ',' && !c.is_whitespace()) {
        token.push(c);
    }
    if is_number(&token) {
        Ok(token)
    } else {
        Err(LineupParseError::InvalidToken(token))
    }
}

fn is_number(token: &str) -> bool {
    let unsigned = token.strip_prefix(['+', '-']).unwrap_or(token);
    let (int, frac) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    digits(int) && frac.map_or(true, digits)
}
