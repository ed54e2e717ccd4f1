//! Token cursor over a single rule or metadata line.

use crate::diagnostics::SyntaxError;
use crate::lexer::{Token, TokenKind};
use crate::location::{Location, ParsedElement, Position};
use std::ops::Range;

use super::PResult;

/// Cursor over the tokens of one logical line, from its leading `*` or
/// keyword up to the next line that could start a rule.
///
/// Tokens that begin a new physical line are hidden unless a production
/// opted into a continuation with [`Cursor::allow_next_line`], so a stray
/// line after a complete rule is left over instead of swallowed.
pub(crate) struct Cursor<'a> {
    tokens: &'a [Token],
    source: &'a str,
    pos: usize,
    line_floor: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(tokens: &'a [Token], source: &'a str) -> Self {
        Self {
            tokens,
            source,
            pos: 0,
            line_floor: 0,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn current(&self) -> Option<&'a Token> {
        self.nth(0)
    }

    pub(crate) fn current_kind(&self) -> Option<TokenKind> {
        self.current().map(|token| token.kind)
    }

    /// Lookahead on the current logical line.
    pub(crate) fn nth(&self, n: usize) -> Option<&'a Token> {
        let index = self.pos + n;
        let token = self.tokens.get(index)?;
        let hidden = (self.line_floor..index)
            .filter_map(|i| self.tokens.get(i + 1))
            .any(|t| t.line_start);
        (!hidden).then_some(token)
    }

    pub(crate) fn nth_kind(&self, n: usize) -> Option<TokenKind> {
        self.nth(n).map(|token| token.kind)
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.current_kind() == Some(kind)
    }

    pub(crate) fn at_end(&self) -> bool {
        self.current().is_none()
    }

    /// Let the next token come from a following line, for lists that may
    /// be split over several lines (`contains` items, `or` types).
    pub(crate) fn allow_next_line(&mut self) {
        self.line_floor = self.pos;
    }

    pub(crate) fn bump(&mut self) -> Option<&'a Token> {
        let token = self.current()?;
        self.pos += 1;
        Some(token)
    }

    pub(crate) fn eat(&mut self, kind: TokenKind) -> Option<&'a Token> {
        if self.at(kind) { self.bump() } else { None }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, expected: &str) -> PResult<&'a Token> {
        self.eat(kind).ok_or_else(|| self.unexpected(expected))
    }

    /// Consume a token accepted by `accept`.
    pub(crate) fn expect_where(
        &mut self,
        accept: impl Fn(TokenKind) -> bool,
        expected: &str,
    ) -> PResult<&'a Token> {
        match self.current() {
            Some(token) if accept(token.kind) => {
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    pub(crate) fn expect_name(&mut self, expected: &str) -> PResult<ParsedElement<String>> {
        self.expect_where(TokenKind::is_name, expected).map(text)
    }

    pub(crate) fn expect_path(&mut self) -> PResult<ParsedElement<String>> {
        self.expect_where(TokenKind::is_path, "an element path")
            .map(text)
    }

    /// Tokens not consumed by the production, hidden ones included.
    pub(crate) fn rest(&self) -> &'a [Token] {
        &self.tokens[self.pos.min(self.tokens.len())..]
    }

    pub(crate) fn tokens(&self, range: Range<usize>) -> &'a [Token] {
        &self.tokens[range]
    }

    /// Location from the token at `start` through the last consumed token.
    pub(crate) fn span(&self, start: usize) -> Location {
        let first = self.tokens.get(start).map(|token| token.location);
        let last = self
            .pos
            .checked_sub(1)
            .and_then(|index| self.tokens.get(index))
            .map(|token| token.location);
        match (first, last) {
            (Some(first), Some(last)) => first.cover(last),
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => Location::new(Position::start(), Position::start()),
        }
    }

    /// Source text from the token at `range.start` to the end of the
    /// token before `range.end`, exactly as written.
    pub(crate) fn source_text(&self, range: Range<usize>) -> ParsedElement<String> {
        let location = match (self.tokens.get(range.start), self.tokens.get(range.end - 1)) {
            (Some(first), Some(last)) => first.location.cover(last.location),
            _ => self.span(range.start),
        };
        let value = location.slice(self.source).to_string();
        ParsedElement::new(value, location)
    }

    pub(crate) fn unexpected(&self, expected: &str) -> SyntaxError {
        match self.current() {
            Some(token) => SyntaxError::syntax(
                format!("expected {expected}, found '{}'", snippet(&token.text)),
                token.location,
            ),
            None => {
                let previous = self.pos.checked_sub(1).and_then(|i| self.tokens.get(i));
                match previous {
                    Some(token) => SyntaxError::syntax(
                        format!("expected {expected} after '{}'", snippet(&token.text)),
                        Location::new(token.location.end, token.location.end),
                    ),
                    None => SyntaxError::syntax(
                        format!("expected {expected}"),
                        Location::new(Position::start(), Position::start()),
                    ),
                }
            }
        }
    }
}

/// Token text as a located value.
pub(crate) fn text(token: &Token) -> ParsedElement<String> {
    ParsedElement::new(token.text.clone(), token.location)
}

/// Location of `range` (byte offsets into the token text) for a token
/// that sits on a single line.
pub(crate) fn sub_location(token: &Token, range: Range<usize>) -> Location {
    let start = token.location.start;
    let at = |offset: usize| {
        let column = start.column + token.text[..offset].chars().count();
        Position::new(start.line, column, start.offset + offset)
    };
    Location::new(at(range.start), at(range.end))
}

/// Part of `token` covered by `range`, with its own location.
pub(crate) fn sub_text(token: &Token, range: Range<usize>) -> ParsedElement<String> {
    let value = token.text[range.clone()].to_string();
    ParsedElement::new(value, sub_location(token, range))
}

/// First line of a token, for error messages.
pub(crate) fn snippet(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    #[test]
    fn next_line_is_hidden_until_allowed() {
        let source = "* extension contains\n  race 0..1";
        let (tokens, _) = lex(source);
        let mut cursor = Cursor::new(&tokens, source);
        cursor.bump();
        cursor.bump();
        cursor.bump();
        assert!(cursor.at_end());
        assert_eq!(cursor.rest().len(), 2);

        cursor.allow_next_line();
        assert_eq!(cursor.current().map(|t| t.text.as_str()), Some("race"));
        cursor.bump();
        assert!(cursor.at(TokenKind::Card));
    }

    #[test]
    fn missing_token_points_after_previous() {
        let source = "* status =";
        let (tokens, _) = lex(source);
        let mut cursor = Cursor::new(&tokens, source);
        while cursor.bump().is_some() {}

        let error = cursor.unexpected("a value");
        assert_eq!(error.message, "expected a value after '='");
        assert_eq!(error.column(), 11);
    }

    #[test]
    fn source_text_spans_tokens() {
        let source = "* value = 10.5 'mg'";
        let (tokens, _) = lex(source);
        let cursor = Cursor::new(&tokens, source);
        let value = cursor.source_text(3..5);
        assert_eq!(value.value, "10.5 'mg'");
        assert_eq!(value.location.map(|l| l.start.column), Some(11));
        assert_eq!(value.location.map(|l| l.end.column), Some(20));
    }

    #[test]
    fn sub_location_counts_characters() {
        let (tokens, _) = lex("* ^ñame = 1");
        let caret = &tokens[1];
        let path = sub_text(caret, 1..caret.text.len());
        assert_eq!(path.value, "ñame");
        let location = path.location.unwrap();
        assert_eq!(location.start.column, 4);
        assert_eq!(location.end.column, 8);
        assert_eq!(location.end.offset - location.start.offset, "ñame".len());
    }
}
