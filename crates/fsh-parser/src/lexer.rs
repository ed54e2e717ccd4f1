//! FSH scanner
//!
//! Turns source text into classified tokens carrying their [`Location`].
//! Whitespace and comments are skipped but still advance the line and
//! column counters. The scanner never stops early: unterminated literals
//! and stray control characters are reported as lexical errors, an
//! [`TokenKind::Error`] token is emitted for the offending text, and
//! scanning resumes right after it.
//!
//! FSH is line oriented, so every token records whether it is the first
//! token on its physical line. Keywords that end in a colon (`Profile:`,
//! `Title:`, ...) are only recognised in that position, and so is the `*`
//! that opens a rule.

use crate::diagnostics::SyntaxError;
use crate::location::{Location, Position};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result returned by the lexer
pub type LexResult = (Vec<Token>, Vec<SyntaxError>);

/// Token classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // Keywords - Entity types
    AliasKw,
    ProfileKw,
    ExtensionKw,
    ValueSetKw,
    CodeSystemKw,
    InstanceKw,
    InvariantKw,
    RuleSetKw,
    MappingKw,
    LogicalKw,
    ResourceKw,

    // Keywords - Metadata
    ParentKw,
    IdKw,
    TitleKw,
    DescriptionKw,
    ExpressionKw,
    XPathKw,
    SeverityKw,
    InstanceOfKw,
    UsageKw,
    SourceKw,
    TargetKw,
    ContextKw,
    CharacteristicsKw,

    // Keywords - Rules
    FromKw,
    ContainsKw,
    NamedKw,
    AndKw,
    OnlyKw,
    OrKw,
    ObeysKw,
    TrueKw,
    FalseKw,
    IncludeKw,
    ExcludeKw,
    CodesKw,
    WhereKw,
    ValueSetRefKw,
    SystemKw,
    ExactlyKw,
    InsertKw,
    ContentReferenceKw,

    // Flags
    MustSupport,
    Summary,
    Modifier,
    Normative,
    TrialUse,
    Draft,

    /// `(required)`, `(extensible)`, `(preferred)` or `(example)`
    Strength,

    // Punctuation
    /// `*` opening a rule line
    Star,
    /// `^path` including the caret
    CaretPath,
    Equal,
    Arrow,
    Colon,
    Comma,

    // Rule set parameters
    ParamOpen,
    Parameter,
    ParamClose,

    // Literals
    String,
    MultilineString,
    Number,
    /// UCUM unit in single quotes
    Unit,
    /// `system#code`, `#code` or `#"quoted code"`
    Code,
    Card,
    DateTime,
    Time,
    Reference,
    Canonical,
    CodeableReference,
    Regex,
    /// Any other run of non-blank characters
    Sequence,

    /// Text the lexer could not make sense of; already reported
    Error,
}

const ENTITY_KEYWORDS: &[(&str, TokenKind)] = &[
    ("Alias", TokenKind::AliasKw),
    ("Profile", TokenKind::ProfileKw),
    ("Extension", TokenKind::ExtensionKw),
    ("ValueSet", TokenKind::ValueSetKw),
    ("CodeSystem", TokenKind::CodeSystemKw),
    ("Instance", TokenKind::InstanceKw),
    ("Invariant", TokenKind::InvariantKw),
    ("RuleSet", TokenKind::RuleSetKw),
    ("Mapping", TokenKind::MappingKw),
    ("Logical", TokenKind::LogicalKw),
    ("Resource", TokenKind::ResourceKw),
];

const METADATA_KEYWORDS: &[(&str, TokenKind)] = &[
    ("Parent", TokenKind::ParentKw),
    ("Id", TokenKind::IdKw),
    ("Title", TokenKind::TitleKw),
    ("Description", TokenKind::DescriptionKw),
    ("Expression", TokenKind::ExpressionKw),
    ("XPath", TokenKind::XPathKw),
    ("Severity", TokenKind::SeverityKw),
    ("InstanceOf", TokenKind::InstanceOfKw),
    ("Usage", TokenKind::UsageKw),
    ("Source", TokenKind::SourceKw),
    ("Target", TokenKind::TargetKw),
    ("Context", TokenKind::ContextKw),
    ("Characteristics", TokenKind::CharacteristicsKw),
];

const WORD_KEYWORDS: &[(&str, TokenKind)] = &[
    ("from", TokenKind::FromKw),
    ("contains", TokenKind::ContainsKw),
    ("named", TokenKind::NamedKw),
    ("and", TokenKind::AndKw),
    ("only", TokenKind::OnlyKw),
    ("or", TokenKind::OrKw),
    ("obeys", TokenKind::ObeysKw),
    ("true", TokenKind::TrueKw),
    ("false", TokenKind::FalseKw),
    ("include", TokenKind::IncludeKw),
    ("exclude", TokenKind::ExcludeKw),
    ("codes", TokenKind::CodesKw),
    ("where", TokenKind::WhereKw),
    ("valueset", TokenKind::ValueSetRefKw),
    ("system", TokenKind::SystemKw),
    ("exactly", TokenKind::ExactlyKw),
    ("insert", TokenKind::InsertKw),
    ("contentReference", TokenKind::ContentReferenceKw),
    ("MS", TokenKind::MustSupport),
    ("SU", TokenKind::Summary),
    ("?!", TokenKind::Modifier),
    ("N", TokenKind::Normative),
    ("TU", TokenKind::TrialUse),
    ("D", TokenKind::Draft),
];

const BINDING_STRENGTHS: &[&str] = &["required", "extensible", "preferred", "example"];

const WRAPPED_TYPES: &[(&str, TokenKind)] = &[
    ("CodeableReference(", TokenKind::CodeableReference),
    ("Reference(", TokenKind::Reference),
    ("Canonical(", TokenKind::Canonical),
];

impl TokenKind {
    pub fn is_entity_keyword(self) -> bool {
        ENTITY_KEYWORDS.iter().any(|(_, kind)| *kind == self)
    }

    pub fn is_metadata_keyword(self) -> bool {
        METADATA_KEYWORDS.iter().any(|(_, kind)| *kind == self)
    }

    pub fn is_flag(self) -> bool {
        matches!(
            self,
            TokenKind::MustSupport
                | TokenKind::Summary
                | TokenKind::Modifier
                | TokenKind::Normative
                | TokenKind::TrialUse
                | TokenKind::Draft
        )
    }

    /// Lower-case rule keywords such as `from` or `contains`.
    pub fn is_rule_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::FromKw
                | TokenKind::ContainsKw
                | TokenKind::NamedKw
                | TokenKind::AndKw
                | TokenKind::OnlyKw
                | TokenKind::OrKw
                | TokenKind::ObeysKw
                | TokenKind::TrueKw
                | TokenKind::FalseKw
                | TokenKind::IncludeKw
                | TokenKind::ExcludeKw
                | TokenKind::CodesKw
                | TokenKind::WhereKw
                | TokenKind::ValueSetRefKw
                | TokenKind::SystemKw
                | TokenKind::ExactlyKw
                | TokenKind::InsertKw
                | TokenKind::ContentReferenceKw
        )
    }

    /// Tokens that can stand for an element path. Rule keywords are
    /// accepted because FHIR has elements called `system`, `codes`, ...
    pub fn is_path(self) -> bool {
        self == TokenKind::Sequence || self.is_rule_keyword()
    }

    /// Tokens that can stand for the name of an entity, type, value set
    /// or invariant.
    pub fn is_name(self) -> bool {
        self.is_path()
            || self.is_flag()
            || matches!(
                self,
                TokenKind::Number | TokenKind::DateTime | TokenKind::Time
            )
    }

    /// Tokens at which the parser can safely resume after an error when
    /// they start a line.
    pub fn is_sync_point(self) -> bool {
        self == TokenKind::Star
            || self == TokenKind::CaretPath
            || self.is_entity_keyword()
            || self.is_metadata_keyword()
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = ENTITY_KEYWORDS
            .iter()
            .chain(METADATA_KEYWORDS)
            .find(|(_, kind)| kind == self)
            .map(|(word, _)| format!("'{word}:'"));
        if let Some(keyword) = keyword {
            return f.write_str(&keyword);
        }
        if let Some((word, _)) = WORD_KEYWORDS.iter().find(|(_, kind)| kind == self) {
            return write!(f, "'{word}'");
        }

        let name = match self {
            TokenKind::Strength => "binding strength",
            TokenKind::Star => "'*'",
            TokenKind::CaretPath => "caret path",
            TokenKind::Equal => "'='",
            TokenKind::Arrow => "'->'",
            TokenKind::Colon => "':'",
            TokenKind::Comma => "','",
            TokenKind::ParamOpen => "'('",
            TokenKind::Parameter => "parameter",
            TokenKind::ParamClose => "')'",
            TokenKind::String => "string",
            TokenKind::MultilineString => "multi-line string",
            TokenKind::Number => "number",
            TokenKind::Unit => "unit",
            TokenKind::Code => "code",
            TokenKind::Card => "cardinality",
            TokenKind::DateTime => "date-time",
            TokenKind::Time => "time",
            TokenKind::Reference => "reference",
            TokenKind::Canonical => "canonical",
            TokenKind::CodeableReference => "codeable reference",
            TokenKind::Regex => "regular expression",
            TokenKind::Sequence => "name",
            _ => "invalid input",
        };
        f.write_str(name)
    }
}

/// A classified piece of source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub kind: TokenKind,
    /// Raw source text of the token
    pub text: String,
    pub location: Location,
    /// First token on its physical line
    pub line_start: bool,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Number of characters before the token on its line.
    pub fn indent(&self) -> usize {
        self.location.start.column - 1
    }
}

/// Lex the provided input into tokens.
pub fn lex(source: &str) -> LexResult {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    offset: usize,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
    errors: Vec<SyntaxError>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> LexResult {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
                continue;
            }

            let start = self.position();
            let rest = self.rest();

            if rest.starts_with("//") {
                self.bump_while(|c| c != '\n');
            } else if rest.starts_with("/*") {
                self.block_comment(start);
            } else if rest.starts_with("\"\"\"") {
                self.multiline_string(start);
            } else if ch == '"' {
                self.string(start);
            } else if ch == '\'' {
                self.unit(start);
            } else if ch.is_control() {
                self.bump();
                self.error(format!("unexpected character {ch:?}"), start);
                self.push(TokenKind::Error, start);
            } else if self.starts_line(start) && ch == '*' {
                self.bump();
                self.push(TokenKind::Star, start);
            } else if self.starts_line(start) && self.colon_keyword(start) {
                // keyword pushed
            } else if ch == '(' && self.binding_strength(start) {
                // strength pushed
            } else if self.wrapped_type(start) {
                // reference or canonical pushed
            } else if ch == '/' && self.regex(start) {
                // regex pushed
            } else if self.expects_rule_set_name() && self.rule_set_reference(start) {
                // name and parameters pushed
            } else {
                self.word(start);
            }
        }

        (self.tokens, self.errors)
    }

    fn position(&self) -> Position {
        Position::new(self.line, self.column, self.offset)
    }

    fn reset(&mut self, position: Position) {
        self.line = position.line;
        self.column = position.column;
        self.offset = position.offset;
    }

    fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn bump_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            self.bump();
        }
    }

    fn bump_to(&mut self, offset: usize) {
        while self.offset < offset && self.bump().is_some() {}
    }

    fn bump_blanks(&mut self) {
        self.bump_while(|c| c == ' ' || c == '\t');
    }

    fn starts_line(&self, start: Position) -> bool {
        self.tokens
            .last()
            .is_none_or(|token| token.location.end.line < start.line)
    }

    fn push(&mut self, kind: TokenKind, start: Position) {
        let end = self.position();
        self.push_span(kind, start, end);
    }

    fn push_span(&mut self, kind: TokenKind, start: Position, end: Position) {
        let line_start = self.starts_line(start);
        self.tokens.push(Token {
            kind,
            text: self.source[start.offset..end.offset].to_string(),
            location: Location::new(start, end),
            line_start,
        });
    }

    fn error(&mut self, message: impl Into<String>, start: Position) {
        let location = Location::new(start, self.position());
        self.errors.push(SyntaxError::lexical(message, location));
    }

    /// Rewind to `start`, skip the rest of the line and report it as an
    /// error token.
    fn fail_to_line_end(&mut self, message: &str, start: Position) {
        self.reset(start);
        self.bump_while(|c| c != '\n' && c != '\r');
        self.error(message, start);
        self.push(TokenKind::Error, start);
    }

    fn block_comment(&mut self, start: Position) {
        self.bump();
        self.bump();
        loop {
            if self.rest().starts_with("*/") {
                self.bump();
                self.bump();
                return;
            }
            if self.bump().is_none() {
                self.error("unterminated block comment", start);
                self.push(TokenKind::Error, start);
                return;
            }
        }
    }

    fn string(&mut self, start: Position) {
        self.bump();
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump();
                }
                Some('"') => {
                    self.push(TokenKind::String, start);
                    return;
                }
                Some(_) => {}
                None => {
                    self.fail_to_line_end("unterminated string literal", start);
                    return;
                }
            }
        }
    }

    fn multiline_string(&mut self, start: Position) {
        let body = &self.rest()[3..];
        match body.find("\"\"\"") {
            Some(close) => {
                let end = self.offset + 3 + close + 3;
                self.bump_to(end);
                self.push(TokenKind::MultilineString, start);
            }
            None => self.fail_to_line_end("unterminated multi-line string literal", start),
        }
    }

    fn unit(&mut self, start: Position) {
        self.bump();
        loop {
            match self.peek() {
                Some('\'') => {
                    self.bump();
                    self.push(TokenKind::Unit, start);
                    return;
                }
                Some('\n') | Some('\r') | None => {
                    self.reset(start);
                    self.bump_while(|c| !c.is_whitespace());
                    self.error("unterminated unit", start);
                    self.push(TokenKind::Error, start);
                    return;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    /// `Profile:`, `Title :` and friends. The keyword may be glued to the
    /// value that follows (`Profile:MyPatient`).
    fn colon_keyword(&mut self, start: Position) -> bool {
        let rest = self.rest();
        let keyword = ENTITY_KEYWORDS
            .iter()
            .chain(METADATA_KEYWORDS)
            .find_map(|(word, kind)| {
                let after = rest.strip_prefix(word)?;
                let blanks = after.len() - after.trim_start_matches([' ', '\t']).len();
                after[blanks..]
                    .starts_with(':')
                    .then_some((*kind, word.len() + blanks + 1))
            });

        match keyword {
            Some((kind, len)) => {
                self.bump_to(self.offset + len);
                self.push(kind, start);
                true
            }
            None => false,
        }
    }

    fn binding_strength(&mut self, start: Position) -> bool {
        let Some(close) = self.rest().find(')') else {
            return false;
        };
        let inner = &self.rest()[1..close];
        if inner.contains('\n') || !BINDING_STRENGTHS.contains(&inner.trim()) {
            return false;
        }
        self.bump_to(self.offset + close + 1);
        self.push(TokenKind::Strength, start);
        true
    }

    fn wrapped_type(&mut self, start: Position) -> bool {
        let rest = self.rest();
        let Some((prefix, kind)) = WRAPPED_TYPES
            .iter()
            .find(|(prefix, _)| rest.starts_with(prefix))
        else {
            return false;
        };
        let line = rest.lines().next().unwrap_or(rest);
        let Some(close) = line[prefix.len()..].find(')') else {
            self.fail_to_line_end(&format!("unterminated '{prefix}'"), start);
            return true;
        };
        self.bump_to(self.offset + prefix.len() + close + 1);
        self.push(*kind, start);
        true
    }

    fn regex(&mut self, start: Position) -> bool {
        if matches!(self.peek_nth(1), None | Some('/') | Some('*')) {
            return false;
        }
        let line = self.rest().lines().next().unwrap_or_default();
        let mut escaped = false;
        let close = line.char_indices().skip(1).find_map(|(index, ch)| {
            if escaped {
                escaped = false;
                None
            } else if ch == '\\' {
                escaped = true;
                None
            } else {
                (ch == '/').then_some(index)
            }
        });
        match close {
            Some(close) => {
                self.bump_to(self.offset + close + 1);
                self.push(TokenKind::Regex, start);
                true
            }
            None => false,
        }
    }

    fn expects_rule_set_name(&self) -> bool {
        self.tokens.last().is_some_and(|token| {
            matches!(token.kind, TokenKind::InsertKw | TokenKind::RuleSetKw)
                && token.location.end.line == self.line
        })
    }

    /// `Name(param, [[param, with comma]], last)` after `insert` or
    /// `RuleSet:`. Returns false when no parameter list follows the name.
    fn rule_set_reference(&mut self, start: Position) -> bool {
        let rest = self.rest();
        let name_len = rest
            .find(|c: char| c.is_whitespace() || c == '(')
            .unwrap_or(rest.len());
        let after = &rest[name_len..];
        let blanks = after.len() - after.trim_start_matches([' ', '\t']).len();
        if name_len == 0 || !after[blanks..].starts_with('(') {
            return false;
        }

        self.bump_to(self.offset + name_len);
        self.push(TokenKind::Sequence, start);
        self.bump_blanks();
        self.parameter_list();
        true
    }

    fn parameter_list(&mut self) {
        let open = self.position();
        self.bump();
        self.push(TokenKind::ParamOpen, open);

        loop {
            self.bump_blanks();
            let start = self.position();
            match self.peek() {
                None | Some('\n') | Some('\r') => {
                    self.error("unterminated parameter list", open);
                    self.push_span(TokenKind::Error, start, start);
                    return;
                }
                Some(')') => {
                    if self.last_is(TokenKind::Comma) {
                        self.push_span(TokenKind::Parameter, start, start);
                    }
                    self.bump();
                    self.push(TokenKind::ParamClose, start);
                    return;
                }
                Some(',') => {
                    if self.last_is(TokenKind::Comma) || self.last_is(TokenKind::ParamOpen) {
                        self.push_span(TokenKind::Parameter, start, start);
                    }
                    self.bump();
                    self.push(TokenKind::Comma, start);
                }
                Some('[') if self.rest().starts_with("[[") => {
                    let Some(close) = self.rest().find("]]") else {
                        self.fail_to_line_end("unterminated bracketed parameter", start);
                        return;
                    };
                    self.bump_to(self.offset + close + 2);
                    self.push(TokenKind::Parameter, start);
                }
                Some(_) => self.plain_parameter(start),
            }
        }
    }

    fn plain_parameter(&mut self, start: Position) {
        let mut end = start;
        while let Some(ch) = self.peek() {
            match ch {
                ',' | ')' | '\n' | '\r' => break,
                '\\' => {
                    self.bump();
                    if matches!(self.peek(), Some('\n') | Some('\r') | None) {
                        break;
                    }
                    self.bump();
                    end = self.position();
                }
                c if c == ' ' || c == '\t' => {
                    self.bump();
                }
                _ => {
                    self.bump();
                    end = self.position();
                }
            }
        }
        self.push_span(TokenKind::Parameter, start, end);
    }

    fn last_is(&self, kind: TokenKind) -> bool {
        self.tokens.last().is_some_and(|token| token.kind == kind)
    }

    fn word(&mut self, start: Position) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || ch.is_control() {
                break;
            }
            if ch == ',' && self.offset > start.offset {
                let next = self.peek_nth(1);
                if next.is_none_or(char::is_whitespace) {
                    break;
                }
            }
            if ch == '#' && self.peek_nth(1) == Some('"') {
                self.bump();
                self.quoted_code(start);
                continue;
            }
            self.bump();
        }

        if self.offset == start.offset {
            // A lone ',' that ended the previous word
            self.bump();
        }

        let text = &self.source[start.offset..self.offset];
        let kind = classify_word(text);
        self.push(kind, start);
    }

    fn quoted_code(&mut self, start: Position) {
        self.bump();
        loop {
            match self.peek() {
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some('"') => {
                    self.bump();
                    return;
                }
                Some('\n') | Some('\r') | None => {
                    self.error("unterminated quoted code", start);
                    return;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }
}

fn classify_word(text: &str) -> TokenKind {
    match text {
        "=" => return TokenKind::Equal,
        "->" => return TokenKind::Arrow,
        ":" => return TokenKind::Colon,
        "," => return TokenKind::Comma,
        _ => {}
    }

    if let Some((_, kind)) = WORD_KEYWORDS.iter().find(|(word, _)| *word == text) {
        return *kind;
    }

    if is_cardinality(text) {
        TokenKind::Card
    } else if is_number(text) {
        TokenKind::Number
    } else if is_time(text) {
        TokenKind::Time
    } else if is_date_time(text) {
        TokenKind::DateTime
    } else if text.len() > 1 && text.starts_with('^') {
        TokenKind::CaretPath
    } else if is_code(text) {
        TokenKind::Code
    } else {
        TokenKind::Sequence
    }
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

fn is_cardinality(text: &str) -> bool {
    match text.split_once("..") {
        Some((min, max)) => {
            (min.is_empty() || is_digits(min)) && (max.is_empty() || max == "*" || is_digits(max))
        }
        None => false,
    }
}

fn is_number(text: &str) -> bool {
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, Some(exponent)),
        None => (unsigned, None),
    };
    let mantissa_ok = match mantissa.split_once('.') {
        Some((whole, fraction)) => is_digits(whole) && is_digits(fraction),
        None => is_digits(mantissa),
    };
    let exponent_ok = exponent.is_none_or(|exp| is_digits(exp.strip_prefix(['+', '-']).unwrap_or(exp)));
    mantissa_ok && exponent_ok
}

/// `HH:MM`, `HH:MM:SS` or `HH:MM:SS.fff`
fn is_time(text: &str) -> bool {
    let (clock, fraction) = match text.split_once('.') {
        Some((clock, fraction)) => (clock, Some(fraction)),
        None => (text, None),
    };
    let parts: Vec<&str> = clock.split(':').collect();
    (2..=3).contains(&parts.len())
        && parts.iter().all(|part| part.len() == 2 && is_digits(part))
        && (fraction.is_none() || (parts.len() == 3 && fraction.is_some_and(is_digits)))
}

/// `YYYY-MM`, `YYYY-MM-DD` or `YYYY-MM-DDThh:mm[:ss[.fff]][Z|+hh:mm]`
fn is_date_time(text: &str) -> bool {
    let (date, time) = match text.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (text, None),
    };
    let parts: Vec<&str> = date.split('-').collect();
    let date_ok = (2..=3).contains(&parts.len())
        && parts[0].len() == 4
        && parts.iter().all(|part| is_digits(part))
        && parts[1..].iter().all(|part| part.len() == 2);
    let time_ok = time.is_none_or(|time| {
        let clock = time
            .strip_suffix('Z')
            .or_else(|| time.rfind(['+', '-']).map(|zone| &time[..zone]))
            .unwrap_or(time);
        is_time(clock)
    });
    date_ok && time_ok && (time.is_none() || parts.len() == 3)
}

fn is_code(text: &str) -> bool {
    text.split_once('#')
        .is_some_and(|(_, code)| !code.is_empty())
}

/// Decode a `"..."` string token into its value.
pub fn unquote_string(text: &str) -> String {
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    unescape(inner)
}

/// Decode a `"""..."""` token: surrounding blank lines are dropped and the
/// common indentation of the remaining lines is removed.
pub fn unquote_multiline(text: &str) -> String {
    let inner = text
        .strip_prefix("\"\"\"")
        .and_then(|t| t.strip_suffix("\"\"\""))
        .unwrap_or(text);

    let mut lines: Vec<&str> = inner.lines().collect();
    if lines.first().is_some_and(|line| line.trim().is_empty()) {
        lines.remove(0);
    }
    if lines.last().is_some_and(|line| line.trim().is_empty()) {
        lines.pop();
    }

    let indent = lines
        .iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    lines
        .iter()
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Value of a rule set parameter token: brackets removed from `[[...]]`,
/// escapes resolved in plain parameters.
pub fn parameter_value(text: &str) -> String {
    if let Some(inner) = text.strip_prefix("[[").and_then(|t| t.strip_suffix("]]")) {
        return inner.to_string();
    }
    let mut value = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(escaped @ (',' | ')' | '\\')) => value.push(escaped),
                Some(other) => {
                    value.push('\\');
                    value.push(other);
                }
                None => value.push('\\'),
            },
            other => value.push(other),
        }
    }
    value.trim().to_string()
}

fn unescape(inner: &str) -> String {
    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            value.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => value.push('\n'),
            Some('r') => value.push('\r'),
            Some('t') => value.push('\t'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => value.push(decoded),
                    None => {
                        value.push_str("\\u");
                        value.push_str(&hex);
                    }
                }
            }
            Some(other) => value.push(other),
            None => value.push('\\'),
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, errors) = lex(source);
        assert!(errors.is_empty(), "unexpected lexer errors: {errors:?}");
        tokens.into_iter().map(|token| token.kind).collect()
    }

    #[test]
    fn lex_profile_header_and_rule() {
        let source = "Profile: Example\nParent: Patient\n* status MS";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::ProfileKw,
                TokenKind::Sequence,
                TokenKind::ParentKw,
                TokenKind::Sequence,
                TokenKind::Star,
                TokenKind::Sequence,
                TokenKind::MustSupport,
            ]
        );
    }

    #[test]
    fn keyword_needs_colon_and_line_start() {
        assert_eq!(
            kinds("* extension contains Profile 0..1"),
            vec![
                TokenKind::Star,
                TokenKind::Sequence,
                TokenKind::ContainsKw,
                TokenKind::Sequence,
                TokenKind::Card,
            ]
        );
        assert_eq!(
            kinds("Title : \"x\""),
            vec![TokenKind::TitleKw, TokenKind::String]
        );
        assert_eq!(
            kinds("Profile:MyPatient"),
            vec![TokenKind::ProfileKw, TokenKind::Sequence]
        );
    }

    #[test]
    fn token_locations_are_one_based() {
        let (tokens, _) = lex("Profile: Example\n  * name 1..1");
        let name = &tokens[1];
        assert_eq!(name.text, "Example");
        assert_eq!(name.location.start, Position::new(1, 10, 9));
        assert_eq!(name.location.end, Position::new(1, 17, 16));

        let star = &tokens[2];
        assert!(star.line_start);
        assert_eq!(star.indent(), 2);
        assert_eq!(star.location.start.line, 2);
        assert!(!tokens[3].line_start);
    }

    #[test]
    fn multiline_string_advances_lines() {
        let source = "Description: \"\"\"\n  first\n  second\n  \"\"\"\n* name 1..1";
        let (tokens, errors) = lex(source);
        assert!(errors.is_empty());
        assert_eq!(tokens[1].kind, TokenKind::MultilineString);
        assert_eq!(tokens[1].location.end.line, 4);
        assert_eq!(tokens[2].kind, TokenKind::Star);
        assert_eq!(tokens[2].location.start, Position::new(5, 1, source.rfind('*').unwrap()));
        assert!(tokens[2].line_start);
    }

    #[test]
    fn string_with_newline_advances_lines() {
        let (tokens, errors) = lex("* a = \"one\ntwo\" exactly");
        assert!(errors.is_empty());
        assert_eq!(tokens[3].kind, TokenKind::String);
        assert_eq!(tokens[4].kind, TokenKind::ExactlyKw);
        assert_eq!(tokens[4].location.start.line, 2);
        assert!(!tokens[4].line_start);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("// header\n* url = http://example.org/a // trailing\n/* block\n */"),
            vec![
                TokenKind::Star,
                TokenKind::Sequence,
                TokenKind::Equal,
                TokenKind::Sequence,
            ]
        );
    }

    #[test]
    fn lex_literals() {
        assert_eq!(
            kinds("* a = 10.5 'mg' http://loinc.org#1234-5 #\"with space\" 2020-01-01 12:30:00 true"),
            vec![
                TokenKind::Star,
                TokenKind::Sequence,
                TokenKind::Equal,
                TokenKind::Number,
                TokenKind::Unit,
                TokenKind::Code,
                TokenKind::Code,
                TokenKind::DateTime,
                TokenKind::Time,
                TokenKind::TrueKw,
            ]
        );
    }

    #[test]
    fn lex_cardinalities_and_flags() {
        assert_eq!(
            kinds("* a 0..* MS SU ?! N TU D"),
            vec![
                TokenKind::Star,
                TokenKind::Sequence,
                TokenKind::Card,
                TokenKind::MustSupport,
                TokenKind::Summary,
                TokenKind::Modifier,
                TokenKind::Normative,
                TokenKind::TrialUse,
                TokenKind::Draft,
            ]
        );
        assert!(is_cardinality("1..1"));
        assert!(is_cardinality("..1"));
        assert!(!is_cardinality("1.1"));
    }

    #[test]
    fn lex_wrapped_types_and_strength() {
        assert_eq!(
            kinds("* subject only Reference(Patient or Group) or Canonical(Foo|1.0)\n* code from VS (required)"),
            vec![
                TokenKind::Star,
                TokenKind::Sequence,
                TokenKind::OnlyKw,
                TokenKind::Reference,
                TokenKind::OrKw,
                TokenKind::Canonical,
                TokenKind::Star,
                TokenKind::Sequence,
                TokenKind::FromKw,
                TokenKind::Sequence,
                TokenKind::Strength,
            ]
        );
    }

    #[test]
    fn lex_insert_parameters() {
        let (tokens, errors) = lex("* insert Named(first, [[a, b]], c\\,d)");
        assert!(errors.is_empty());
        let texts: Vec<_> = tokens
            .iter()
            .map(|token| (token.kind, token.text.as_str()))
            .collect();
        assert_eq!(
            texts,
            vec![
                (TokenKind::Star, "*"),
                (TokenKind::InsertKw, "insert"),
                (TokenKind::Sequence, "Named"),
                (TokenKind::ParamOpen, "("),
                (TokenKind::Parameter, "first"),
                (TokenKind::Comma, ","),
                (TokenKind::Parameter, "[[a, b]]"),
                (TokenKind::Comma, ","),
                (TokenKind::Parameter, "c\\,d"),
                (TokenKind::ParamClose, ")"),
            ]
        );
        assert_eq!(parameter_value("[[a, b]]"), "a, b");
        assert_eq!(parameter_value("c\\,d"), "c,d");
    }

    #[test]
    fn unterminated_parameter_list_is_reported() {
        let (_, errors) = lex("RuleSet: Params(a, b\n* name 1..1");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "unterminated parameter list");
        assert_eq!(errors[0].line(), 1);
    }

    #[test]
    fn unterminated_block_comment_is_an_error_token() {
        let (tokens, errors) = lex("Profile: A\n/* never closed\n* name 1..1");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "unterminated block comment");
        assert_eq!(errors[0].line(), 2);
        let last = tokens.last().expect("error token");
        assert_eq!(last.kind, TokenKind::Error);
        assert_eq!(last.location.start.line, 2);
        assert!(last.text.ends_with("1..1"));
    }

    #[test]
    fn unclosed_wrapped_type_is_an_error_token() {
        let (tokens, errors) = lex("* subject only Reference(Patient\n* code = Canonical(\n");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "unterminated 'Reference('");
        assert_eq!(errors[1].message, "unterminated 'Canonical('");
        let error_tokens: Vec<_> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Error)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(error_tokens, ["Reference(Patient", "Canonical("]);
    }

    #[test]
    fn context_list_splits_commas() {
        assert_eq!(
            kinds("Context: Patient, Observation.code"),
            vec![
                TokenKind::ContextKw,
                TokenKind::Sequence,
                TokenKind::Comma,
                TokenKind::Sequence,
            ]
        );
    }

    #[test]
    fn unterminated_string_recovers_at_next_line() {
        let (tokens, errors) = lex("Title: \"broken\n");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "unterminated string literal");
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Error));
    }

    #[test]
    fn control_character_is_reported_and_skipped() {
        let (tokens, errors) = lex("* a\u{7}b 1..1");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].column(), 4);
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Error));
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Card));
    }

    #[test]
    fn decode_strings() {
        assert_eq!(unquote_string(r#""say \"hi\"\n""#), "say \"hi\"\n");
        assert_eq!(
            unquote_multiline("\"\"\"\n    line one\n      indented\n    \"\"\""),
            "line one\n  indented"
        );
    }
}
