//! Error-tolerant recursive descent parser for FSH documents
//!
//! The parser walks the token stream one logical line at a time. Entity
//! keywords open a new entity, metadata keywords and `*` rule lines fill
//! the open one. A line that fails to parse is reported once and skipped;
//! the entity it belongs to is kept with its remaining rules.

mod cursor;
mod entities;
mod rules;
mod terminology;

use crate::ast::{
    Extension, FshDocument, Instance, Invariant, Logical, Mapping, Profile, Resource, RuleSet,
    ValueSet,
};
use crate::config::ParserConfig;
use crate::diagnostics::{Diagnostics, ParseErrors, SyntaxError};
use crate::lexer::{Token, TokenKind, lex};
use crate::location::Location;
use cursor::{Cursor, snippet};
use entities::{CodeSystemBuilder, EntityBuilder};
use tracing::{debug, trace};

pub(crate) type PResult<T> = std::result::Result<T, SyntaxError>;

/// Scan and parse `source`. Lexical and syntax errors are collected
/// together and returned in source order next to the document.
pub(crate) fn parse_document(
    source: &str,
    config: &ParserConfig,
) -> (FshDocument, Option<ParseErrors>) {
    let (tokens, lexical_errors) = lex(source);

    let mut parser = Parser::new(source, &tokens, config);
    parser.diagnostics.extend(lexical_errors);
    let document = parser.parse_document();

    debug!(
        tokens = tokens.len(),
        entities = document.entities().count(),
        aliases = document.aliases.len(),
        errors = parser.diagnostics.len(),
        "Parsed FSH document"
    );
    (document, parser.diagnostics.finish(config.max_errors))
}

struct Parser<'a> {
    source: &'a str,
    tokens: &'a [Token],
    pos: usize,
    diagnostics: Diagnostics,
    config: &'a ParserConfig,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str, tokens: &'a [Token], config: &'a ParserConfig) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            diagnostics: Diagnostics::new(),
            config,
        }
    }

    /// Parse the whole document
    fn parse_document(&mut self) -> FshDocument {
        let mut document = FshDocument::new();

        while let Some(token) = self.current() {
            match token.kind {
                TokenKind::AliasKw => self.parse_alias(&mut document),
                TokenKind::ProfileKw => self.parse_entity::<Profile>(&mut document),
                TokenKind::ExtensionKw => self.parse_entity::<Extension>(&mut document),
                TokenKind::LogicalKw => self.parse_entity::<Logical>(&mut document),
                TokenKind::ResourceKw => self.parse_entity::<Resource>(&mut document),
                TokenKind::ValueSetKw => self.parse_entity::<ValueSet>(&mut document),
                TokenKind::CodeSystemKw => self.parse_entity::<CodeSystemBuilder>(&mut document),
                TokenKind::InstanceKw => self.parse_entity::<Instance>(&mut document),
                TokenKind::InvariantKw => self.parse_entity::<Invariant>(&mut document),
                TokenKind::RuleSetKw => self.parse_entity::<RuleSet>(&mut document),
                TokenKind::MappingKw => self.parse_entity::<Mapping>(&mut document),
                TokenKind::Error => self.skip_until_definition(),
                TokenKind::Star | TokenKind::CaretPath => {
                    self.error(
                        "rule is not part of any entity; rules must follow an entity declaration",
                        token.location,
                    );
                    self.skip_until_definition();
                }
                _ => {
                    self.error(
                        format!("'{}' is not valid at the top level", snippet(&token.text)),
                        token.location,
                    );
                    self.skip_until_definition();
                }
            }
        }

        document
    }

    /// Parse alias declaration
    fn parse_alias(&mut self, document: &mut FshDocument) {
        if let Some((alias, _)) = self.line(entities::alias) {
            document.aliases.push(alias);
        }
    }

    /// Parse an entity declaration and its body
    ///
    /// A header that does not parse drops the whole entity, since its
    /// rules have nothing to attach to.
    fn parse_entity<B: EntityBuilder>(&mut self, document: &mut FshDocument) {
        let Some((header, _)) = self.line(|cursor| entities::header(cursor, B::KIND)) else {
            self.skip_until_definition();
            return;
        };

        trace!(kind = B::KIND.as_str(), name = %header.name.value, "Parsing entity");
        let mut location = header.location;
        let mut builder = B::new(header);
        self.parse_entity_body(&mut builder, &mut location);
        builder.finish(location, document);
    }

    /// Metadata and rule lines up to the next entity keyword
    fn parse_entity_body<B: EntityBuilder>(&mut self, builder: &mut B, location: &mut Location) {
        while let Some(token) = self.current() {
            match token.kind {
                kind if kind.is_entity_keyword() => break,
                TokenKind::Star => {
                    let indent = token.indent();
                    self.check_indentation(token);
                    let Some((rule, span)) = self.line(|cursor| rules::rule(cursor, B::RULES))
                    else {
                        continue;
                    };
                    match builder.add_rule(rule, indent) {
                        Ok(()) => *location = location.cover(span),
                        Err(error) => self.diagnostics.push(error),
                    }
                }
                kind if kind.is_metadata_keyword() => {
                    if !B::METADATA.contains(&kind) {
                        self.error(
                            format!(
                                "{kind} is not allowed in {} {}",
                                B::KIND.article(),
                                B::KIND
                            ),
                            token.location,
                        );
                        self.skip_line();
                    } else if let Some((metadata, span)) = self.line(entities::metadata) {
                        builder.set_metadata(metadata);
                        *location = location.cover(span);
                    }
                }
                TokenKind::CaretPath => {
                    self.error("missing '*' before the caret rule", token.location);
                    self.skip_line();
                }
                TokenKind::Error => self.skip_line(),
                _ => {
                    self.error(
                        format!("unexpected '{}'", snippet(&token.text)),
                        token.location,
                    );
                    self.skip_line();
                }
            }
        }
    }

    /// Run `production` over the logical line at the current token and
    /// move past it.
    ///
    /// Lines holding a token the lexer already reported are skipped without
    /// another diagnostic. Leftover tokens on the rule's own line fail the
    /// line; leftover lines after it are reported on their own and the
    /// parsed value is kept.
    fn line<T>(
        &mut self,
        production: impl FnOnce(&mut Cursor<'a>) -> PResult<T>,
    ) -> Option<(T, Location)> {
        let tokens = self.tokens;
        let start = self.pos;
        let end = self.line_end();
        self.pos = end;
        let line = &tokens[start..end];

        if line.iter().any(|token| token.is(TokenKind::Error)) {
            trace!(
                line = line.first().map(|t| t.location.start.line),
                "Skipping line with lexical errors"
            );
            return None;
        }

        let mut cursor = Cursor::new(line, self.source);
        let parsed = production(&mut cursor).and_then(|value| match cursor.rest().first() {
            Some(token) if !token.line_start => Err(cursor.unexpected("the end of the line")),
            _ => Ok(value),
        });

        match parsed {
            Ok(value) => {
                if let Some(junk) = cursor.rest().first() {
                    self.error(
                        format!("unexpected '{}'", snippet(&junk.text)),
                        junk.location,
                    );
                }
                Some((value, cursor.span(0)))
            }
            Err(error) => {
                trace!(%error, "Recovering at the next line");
                self.diagnostics.push(error);
                None
            }
        }
    }

    fn check_indentation(&mut self, star: &Token) {
        let width = self.config.indent_width.max(1);
        if self.config.strict_indentation && star.indent() % width != 0 {
            self.error(
                format!(
                    "indentation of {} spaces is not a multiple of {width}",
                    star.indent()
                ),
                star.location,
            );
        }
    }

    // Helper methods

    fn current(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn error(&mut self, message: impl Into<String>, location: Location) {
        self.diagnostics.push(SyntaxError::syntax(message, location));
    }

    /// Index of the next token that starts a line with `*`, `^` or a
    /// keyword.
    fn line_end(&self) -> usize {
        self.tokens
            .iter()
            .enumerate()
            .skip(self.pos + 1)
            .find(|(_, token)| token.line_start && token.kind.is_sync_point())
            .map_or(self.tokens.len(), |(index, _)| index)
    }

    fn skip_line(&mut self) {
        self.pos = self.line_end();
    }

    fn skip_until_definition(&mut self) {
        while let Some(token) = self.current() {
            if token.kind.is_entity_keyword() {
                break;
            }
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> (FshDocument, Vec<SyntaxError>) {
        parse_with(source, &ParserConfig::default())
    }

    fn parse_with(source: &str, config: &ParserConfig) -> (FshDocument, Vec<SyntaxError>) {
        let (document, errors) = parse_document(source, config);
        let errors = errors.map(|e| e.errors().to_vec()).unwrap_or_default();
        (document, errors)
    }

    #[test]
    fn rule_outside_entity() {
        let (document, errors) = parse("* ^abstract = true");
        assert!(document.is_empty());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("not part of any entity"));
    }

    #[test]
    fn junk_at_top_level_skips_to_next_entity() {
        let (document, errors) = parse("hello world\n* a 1..1\nProfile: A\nParent: Patient");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "'hello' is not valid at the top level");
        assert_eq!(document.profiles.len(), 1);
    }

    #[test]
    fn bad_header_drops_entity() {
        let (document, errors) = parse("Profile:\n* name 1..1\nProfile: B");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line(), 1);
        assert_eq!(document.profiles.len(), 1);
        assert_eq!(document.profiles[0].name.value, "B");
    }

    #[test]
    fn leftover_tokens_fail_the_rule() {
        let (document, errors) = parse("Profile: A\n* name 1..1 MS extra\n* status MS");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "expected the end of the line, found 'extra'");
        assert_eq!(document.profiles[0].rules.len(), 1);
    }

    #[test]
    fn junk_line_after_rule_is_reported_separately() {
        let (document, errors) = parse("Profile: A\n* name 1..1\n!!!junk\n* status MS");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "unexpected '!!!junk'");
        assert_eq!(errors[0].line(), 3);
        assert_eq!(document.profiles[0].rules.len(), 2);
    }

    #[test]
    fn metadata_not_allowed_for_kind() {
        let (document, errors) = parse("ValueSet: VS\nParent: Patient\nTitle: \"VS\"");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "'Parent:' is not allowed in a ValueSet");
        assert_eq!(
            document.value_sets[0].title.as_ref().map(|t| t.as_str()),
            Some("VS")
        );
    }

    #[test]
    fn caret_rule_without_star() {
        let (document, errors) = parse("Profile: A\n^status = #draft\n* name MS");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "missing '*' before the caret rule");
        assert_eq!(document.profiles[0].rules.len(), 1);
    }

    #[test]
    fn strict_indentation() {
        let config = ParserConfig {
            strict_indentation: true,
            ..ParserConfig::default()
        };
        let source = "CodeSystem: CS\n* #a\n   * #b";
        let (document, errors) = parse_with(source, &config);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "indentation of 3 spaces is not a multiple of 2");
        assert_eq!(document.code_systems[0].concepts[0].sub_concepts.len(), 1);

        let (_, errors) = parse(source);
        assert!(errors.is_empty());
    }

    #[test]
    fn entity_location_covers_rules() {
        let (document, _) = parse("Profile: A\nParent: Patient\n* name 1..1\n\n// trailing\n");
        let location = document.profiles[0].location;
        assert_eq!(location.start.line, 1);
        assert_eq!(location.end.line, 3);
        assert_eq!(location.end.column, 12);
    }
}
