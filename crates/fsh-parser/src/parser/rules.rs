//! Rule productions
//!
//! Every production starts at the current token and returns the rule or
//! the first syntax error. Rule locations run from the leading `*` to the
//! last token the rule consumed.

use crate::ast::{
    AddElementRule, AssignmentRule, BindingRule, BindingStrength, CardRule, Cardinality,
    CardinalityMax, CaretValueRule, ContainsItem, ContainsRule, DataType, Flag, FlagRule, Flags,
    InsertRule, MappingRule, ObeysRule, PathRule, RuleSetRule, SdRule, Text, TypeRule,
};
use crate::diagnostics::SyntaxError;
use crate::lexer::{self, Token, TokenKind};
use crate::location::ParsedElement;

use super::PResult;
use super::cursor::{Cursor, sub_location, sub_text, text};
use super::terminology;

/// Which entity a rule line belongs to. Decides how ambiguous lines are
/// read: `* #a "A"` is a concept in a code system but a component in a
/// value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RuleContext {
    StructureDefinition,
    /// Logical models and resources, which may add elements
    LogicalModel,
    ValueSet,
    CodeSystem,
    Instance,
    Mapping,
    RuleSet,
}

impl RuleContext {
    fn allows_add_element(self) -> bool {
        matches!(self, RuleContext::LogicalModel | RuleContext::RuleSet)
    }
}

/// Parse a rule line, starting at its `*`
pub(crate) fn rule(cursor: &mut Cursor<'_>, context: RuleContext) -> PResult<RuleSetRule> {
    cursor.expect(TokenKind::Star, "'*'")?;

    match cursor.current_kind() {
        Some(TokenKind::IncludeKw | TokenKind::ExcludeKw) => {
            terminology::component(cursor).map(RuleSetRule::ValueSetComponent)
        }
        Some(TokenKind::CodesKw) if cursor.nth_kind(1) == Some(TokenKind::FromKw) => {
            terminology::component(cursor).map(RuleSetRule::ValueSetComponent)
        }
        Some(TokenKind::Code) => terminology::code_rule(cursor, context),
        _ => structure_rule(cursor, context.allows_add_element()),
    }
}

/// Rules that start with a path, or with `insert`, `obeys`, `^` or `->`.
fn structure_rule(cursor: &mut Cursor<'_>, add_elements: bool) -> PResult<RuleSetRule> {
    let rule = match cursor.current_kind() {
        Some(TokenKind::InsertKw) => SdRule::Insert(insert_rule(cursor, None)?),
        Some(TokenKind::ObeysKw) => SdRule::Obeys(obeys_rule(cursor, None)?),
        Some(TokenKind::CaretPath) => SdRule::CaretValue(caret_value_rule(cursor, None)?),
        Some(TokenKind::Arrow) => return mapping_rule(cursor, None).map(RuleSetRule::Mapping),
        _ => {
            let path = cursor.expect_path()?;
            match cursor.current_kind() {
                None => SdRule::Path(PathRule {
                    path,
                    location: cursor.span(0),
                }),
                Some(TokenKind::CaretPath) => {
                    SdRule::CaretValue(caret_value_rule(cursor, Some(path))?)
                }
                Some(TokenKind::InsertKw) => SdRule::Insert(insert_rule(cursor, Some(path))?),
                Some(TokenKind::ObeysKw) => SdRule::Obeys(obeys_rule(cursor, Some(path))?),
                Some(TokenKind::Card) => card_rule(cursor, path, add_elements)?,
                Some(TokenKind::AndKw) => SdRule::Flag(flag_rule(cursor, path)?),
                Some(kind) if kind.is_flag() => SdRule::Flag(flag_rule(cursor, path)?),
                Some(TokenKind::FromKw) => SdRule::Binding(binding_rule(cursor, path)?),
                Some(TokenKind::Equal) => SdRule::Assignment(assignment_rule(cursor, path)?),
                Some(TokenKind::ContainsKw) => SdRule::Contains(contains_rule(cursor, path)?),
                Some(TokenKind::OnlyKw) => SdRule::Type(type_rule(cursor, path)?),
                Some(TokenKind::Arrow) => {
                    return mapping_rule(cursor, Some(path)).map(RuleSetRule::Mapping);
                }
                Some(_) => return Err(cursor.unexpected("a rule after the element path")),
            }
        }
    };
    Ok(RuleSetRule::Sd(rule))
}

/// Parse a cardinality rule, or an add-element rule when types follow
///
/// Grammar: path CARD flag* | path CARD flag* type (or type)* STRING STRING?
fn card_rule(cursor: &mut Cursor<'_>, element: Text, add_elements: bool) -> PResult<SdRule> {
    let cardinality = cardinality(cursor)?;
    let flags = flags(cursor);

    let starts_type = cursor
        .current_kind()
        .is_some_and(|kind| kind.is_name() || is_wrapped_type(kind));
    if add_elements && starts_type {
        return add_element_rule(cursor, element, cardinality, flags).map(SdRule::AddElement);
    }

    Ok(SdRule::Card(CardRule {
        element,
        cardinality,
        flags,
        location: cursor.span(0),
    }))
}

fn add_element_rule(
    cursor: &mut Cursor<'_>,
    path: Text,
    cardinality: Cardinality,
    flags: Flags,
) -> PResult<AddElementRule> {
    let mut content_reference = None;
    let mut types = Vec::new();
    if cursor.eat(TokenKind::ContentReferenceKw).is_some() {
        let target = cursor.expect_where(
            |kind| kind == TokenKind::Code || kind.is_name(),
            "a content reference",
        )?;
        content_reference = Some(text(target));
    } else {
        types = type_list(cursor)?;
    }

    let short = string(cursor, "a short description")?;
    let definition = optional_string(cursor, true);

    Ok(AddElementRule {
        path,
        cardinality,
        flags,
        types,
        content_reference,
        short,
        definition,
        location: cursor.span(0),
    })
}

/// Grammar: path (and path)* flag+
fn flag_rule(cursor: &mut Cursor<'_>, element: Text) -> PResult<FlagRule> {
    let mut elements = vec![element];
    while cursor.eat(TokenKind::AndKw).is_some() {
        elements.push(cursor.expect_path()?);
    }

    let flags = flags(cursor);
    if flags.is_empty() {
        return Err(cursor.unexpected("a flag"));
    }

    Ok(FlagRule {
        elements,
        flags,
        location: cursor.span(0),
    })
}

/// Grammar: path from NAME STRENGTH?
fn binding_rule(cursor: &mut Cursor<'_>, bindable: Text) -> PResult<BindingRule> {
    cursor.expect(TokenKind::FromKw, "'from'")?;
    let value_set = cursor.expect_name("a value set")?;

    let strength = match cursor.eat(TokenKind::Strength) {
        Some(token) => {
            let word = token.text.trim_start_matches('(').trim_end_matches(')');
            let strength = word
                .parse::<BindingStrength>()
                .map_err(|message| SyntaxError::syntax(message, token.location))?;
            Some(ParsedElement::new(strength, token.location))
        }
        None => None,
    };

    Ok(BindingRule {
        bindable,
        value_set,
        strength,
        location: cursor.span(0),
    })
}

/// Grammar: path = value exactly?
fn assignment_rule(cursor: &mut Cursor<'_>, element: Text) -> PResult<AssignmentRule> {
    cursor.expect(TokenKind::Equal, "'='")?;
    let value = value(cursor)?;
    let exactly = match cursor.eat(TokenKind::ExactlyKw) {
        Some(token) => ParsedElement::new(true, token.location),
        None => ParsedElement::without_location(false),
    };

    Ok(AssignmentRule {
        element,
        value,
        exactly,
        location: cursor.span(0),
    })
}

/// Grammar: path contains item (and item)*
///
/// Items may continue on the following lines.
fn contains_rule(cursor: &mut Cursor<'_>, element: Text) -> PResult<ContainsRule> {
    cursor.expect(TokenKind::ContainsKw, "'contains'")?;

    let mut items = Vec::new();
    loop {
        cursor.allow_next_line();
        items.push(contains_item(cursor)?);
        if cursor.eat(TokenKind::AndKw).is_none() {
            break;
        }
    }

    Ok(ContainsRule {
        element,
        items,
        location: cursor.span(0),
    })
}

/// Grammar: NAME (named NAME)? CARD flag*
fn contains_item(cursor: &mut Cursor<'_>) -> PResult<ContainsItem> {
    let start = cursor.position();
    let name = cursor.expect_name("an item name")?;
    let local_name = match cursor.eat(TokenKind::NamedKw) {
        Some(_) => Some(cursor.expect_name("a slice name")?),
        None => None,
    };
    let cardinality = cardinality(cursor)?;
    let flags = flags(cursor);

    Ok(ContainsItem {
        name,
        local_name,
        cardinality,
        flags,
        location: cursor.span(start),
    })
}

/// Grammar: path only type (or type)*
fn type_rule(cursor: &mut Cursor<'_>, element: Text) -> PResult<TypeRule> {
    cursor.expect(TokenKind::OnlyKw, "'only'")?;
    let types = type_list(cursor)?;

    Ok(TypeRule {
        element,
        types,
        location: cursor.span(0),
    })
}

fn type_list(cursor: &mut Cursor<'_>) -> PResult<Vec<DataType>> {
    let mut types = vec![data_type(cursor)?];
    while cursor.eat(TokenKind::OrKw).is_some() {
        cursor.allow_next_line();
        types.push(data_type(cursor)?);
    }
    Ok(types)
}

fn data_type(cursor: &mut Cursor<'_>) -> PResult<DataType> {
    let token = cursor.expect_where(
        |kind| kind.is_name() || is_wrapped_type(kind),
        "a type",
    )?;

    Ok(match token.kind {
        TokenKind::Reference => DataType::Reference(wrapped_inner(token)),
        TokenKind::Canonical => DataType::Canonical(wrapped_inner(token)),
        TokenKind::CodeableReference => DataType::CodeableReference(wrapped_inner(token)),
        _ => DataType::Name(text(token)),
    })
}

fn is_wrapped_type(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Reference | TokenKind::Canonical | TokenKind::CodeableReference
    )
}

/// `Reference( Patient or Group )` gives `Patient or Group`.
fn wrapped_inner(token: &Token) -> Text {
    let open = token.text.find('(').map_or(0, |index| index + 1);
    let close = token.text.rfind(')').unwrap_or(token.text.len()).max(open);
    let inner = &token.text[open..close];
    let start = open + (inner.len() - inner.trim_start().len());
    let end = start + inner.trim().len();
    sub_text(token, start..end)
}

/// Grammar: path? obeys NAME (and NAME)*
fn obeys_rule(cursor: &mut Cursor<'_>, element: Option<Text>) -> PResult<ObeysRule> {
    cursor.expect(TokenKind::ObeysKw, "'obeys'")?;

    let mut invariants = vec![cursor.expect_name("an invariant name")?];
    while cursor.eat(TokenKind::AndKw).is_some() {
        cursor.allow_next_line();
        invariants.push(cursor.expect_name("an invariant name")?);
    }

    Ok(ObeysRule {
        element,
        invariants,
        location: cursor.span(0),
    })
}

/// Grammar: path? ^path = value
fn caret_value_rule(cursor: &mut Cursor<'_>, element: Option<Text>) -> PResult<CaretValueRule> {
    let caret_path = caret_path(cursor)?;
    cursor.expect(TokenKind::Equal, "'='")?;
    let value = value(cursor)?;

    Ok(CaretValueRule {
        element,
        caret_path,
        value,
        location: cursor.span(0),
    })
}

/// The path of a `^path` token, without the caret.
pub(crate) fn caret_path(cursor: &mut Cursor<'_>) -> PResult<Text> {
    let token = cursor.expect(TokenKind::CaretPath, "a caret path")?;
    Ok(sub_text(token, 1..token.text.len()))
}

/// Grammar: path? insert NAME params?
fn insert_rule(cursor: &mut Cursor<'_>, path: Option<Text>) -> PResult<InsertRule> {
    let (rule_set_name, parameters) = insert_target(cursor)?;

    Ok(InsertRule {
        path,
        rule_set_name,
        parameters,
        location: cursor.span(0),
    })
}

/// `insert Name` or `insert Name(a, b)`
pub(crate) fn insert_target(cursor: &mut Cursor<'_>) -> PResult<(Text, Vec<Text>)> {
    cursor.expect(TokenKind::InsertKw, "'insert'")?;
    let name = cursor.expect_name("a rule set name")?;
    let parameters = if cursor.at(TokenKind::ParamOpen) {
        parameters(cursor)?
    } else {
        Vec::new()
    };
    Ok((name, parameters))
}

/// Parse parameter list: (param1, [[param, 2]], last)
pub(crate) fn parameters(cursor: &mut Cursor<'_>) -> PResult<Vec<Text>> {
    cursor.expect(TokenKind::ParamOpen, "'('")?;

    let mut parameters = Vec::new();
    if cursor.eat(TokenKind::ParamClose).is_some() {
        return Ok(parameters);
    }

    // bracketed parameters may run over several lines
    loop {
        cursor.allow_next_line();
        let token = cursor.expect(TokenKind::Parameter, "a parameter")?;
        parameters.push(ParsedElement::new(
            lexer::parameter_value(&token.text),
            token.location,
        ));
        cursor.allow_next_line();
        if cursor.eat(TokenKind::Comma).is_none() {
            cursor.expect(TokenKind::ParamClose, "',' or ')'")?;
            return Ok(parameters);
        }
    }
}

/// Grammar: path? -> STRING STRING? CODE?
fn mapping_rule(cursor: &mut Cursor<'_>, path: Option<Text>) -> PResult<MappingRule> {
    cursor.expect(TokenKind::Arrow, "'->'")?;
    let target = string(cursor, "a mapping target")?;
    let comment = optional_string(cursor, false);
    let language = cursor.eat(TokenKind::Code).map(text);

    Ok(MappingRule {
        path,
        target,
        comment,
        language,
        location: cursor.span(0),
    })
}

/// Parse a cardinality token such as `0..1`, `1..*` or `..5`
pub(crate) fn cardinality(cursor: &mut Cursor<'_>) -> PResult<Cardinality> {
    let token = cursor.expect(TokenKind::Card, "a cardinality")?;
    let (min, max) = token.text.split_once("..").unwrap_or((&token.text, ""));
    let max_start = min.len() + 2;

    let min = match min {
        "" => None,
        digits => Some(ParsedElement::new(
            bound(digits, token)?,
            sub_location(token, 0..digits.len()),
        )),
    };
    let max_location = sub_location(token, max_start..token.text.len());
    let max = match max {
        "" => None,
        "*" => Some(ParsedElement::new(CardinalityMax::Unbounded, max_location)),
        digits => Some(ParsedElement::new(
            CardinalityMax::Bounded(bound(digits, token)?),
            max_location,
        )),
    };

    Ok(Cardinality {
        min,
        max,
        location: token.location,
    })
}

fn bound(digits: &str, token: &Token) -> PResult<u32> {
    digits.parse().map_err(|_| {
        SyntaxError::syntax(
            format!("cardinality bound '{digits}' is out of range"),
            token.location,
        )
    })
}

/// Zero or more flags, in any order.
pub(crate) fn flags(cursor: &mut Cursor<'_>) -> Flags {
    let mut flags = Flags::default();
    while let Some(token) = cursor.current() {
        let Some(flag) = flag_of(token.kind) else {
            break;
        };
        flags.set(flag, token.location);
        cursor.bump();
    }
    flags
}

fn flag_of(kind: TokenKind) -> Option<Flag> {
    match kind {
        TokenKind::MustSupport => Some(Flag::MustSupport),
        TokenKind::Summary => Some(Flag::Summary),
        TokenKind::Modifier => Some(Flag::Modifier),
        TokenKind::Normative => Some(Flag::Normative),
        TokenKind::TrialUse => Some(Flag::TrialUse),
        TokenKind::Draft => Some(Flag::Draft),
        _ => None,
    }
}

/// Parse the right-hand side of an assignment or caret rule.
///
/// Every token up to `exactly` or the end of the line belongs to the
/// value, and the result is the source text they span.
pub(crate) fn value(cursor: &mut Cursor<'_>) -> PResult<Text> {
    let start = cursor.position();
    while cursor
        .current()
        .is_some_and(|token| !token.is(TokenKind::ExactlyKw))
    {
        cursor.bump();
    }
    let end = cursor.position();
    if start == end {
        return Err(cursor.unexpected("a value"));
    }

    let value = cursor.source_text(start..end);
    let kinds: Vec<TokenKind> = cursor.tokens(start..end).iter().map(|t| t.kind).collect();
    if !is_value(&kinds) {
        let location = cursor.span(start);
        return Err(SyntaxError::syntax(
            format!("'{}' is not a valid value", value.value),
            location,
        ));
    }
    Ok(value)
}

/// Token shapes accepted as a value: literals, `code "display"`,
/// `Reference(x) "display"`, quantities and ratios.
fn is_value(kinds: &[TokenKind]) -> bool {
    if let Some(colon) = kinds.iter().position(|kind| *kind == TokenKind::Colon) {
        return is_ratio_part(&kinds[..colon]) && is_ratio_part(&kinds[colon + 1..]);
    }

    match kinds {
        [single] => {
            single.is_name()
                || matches!(
                    single,
                    TokenKind::String
                        | TokenKind::MultilineString
                        | TokenKind::Code
                        | TokenKind::Unit
                        | TokenKind::Reference
                        | TokenKind::Canonical
                        | TokenKind::CodeableReference
                )
        }
        [TokenKind::Reference | TokenKind::Code | TokenKind::Unit, TokenKind::String] => true,
        _ => is_quantity(kinds),
    }
}

/// `5 'mg'`, `5 'mg' "milligram"`, `5 http://unitsofmeasure.org#mg`
fn is_quantity(kinds: &[TokenKind]) -> bool {
    matches!(
        kinds,
        [TokenKind::Number, TokenKind::Unit | TokenKind::Code]
            | [TokenKind::Number, TokenKind::Unit | TokenKind::Code, TokenKind::String]
    )
}

fn is_ratio_part(kinds: &[TokenKind]) -> bool {
    matches!(kinds, [TokenKind::Number] | [TokenKind::Unit]) || is_quantity(kinds)
}

/// A `"..."` string, decoded.
pub(crate) fn string(cursor: &mut Cursor<'_>, expected: &str) -> PResult<Text> {
    let token = cursor.expect(TokenKind::String, expected)?;
    Ok(ParsedElement::new(
        lexer::unquote_string(&token.text),
        token.location,
    ))
}

/// An optional string, decoded. Multi-line strings are accepted when
/// `multiline` is set.
pub(crate) fn optional_string(cursor: &mut Cursor<'_>, multiline: bool) -> Option<Text> {
    let token = cursor.current()?;
    let value = match token.kind {
        TokenKind::String => lexer::unquote_string(&token.text),
        TokenKind::MultilineString if multiline => lexer::unquote_multiline(&token.text),
        _ => return None,
    };
    cursor.bump();
    Some(ParsedElement::new(value, token.location))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse_rule(source: &str, context: RuleContext) -> PResult<RuleSetRule> {
        let (tokens, errors) = lex(source);
        assert!(errors.is_empty(), "{errors:?}");
        let mut cursor = Cursor::new(&tokens, source);
        let rule = rule(&mut cursor, context)?;
        assert!(cursor.rest().is_empty(), "left over: {:?}", cursor.rest());
        Ok(rule)
    }

    fn sd(source: &str) -> SdRule {
        match parse_rule(source, RuleContext::StructureDefinition) {
            Ok(RuleSetRule::Sd(rule)) => rule,
            other => panic!("expected a structure rule, got {other:?}"),
        }
    }

    #[test]
    fn card_rule_with_flags() {
        let SdRule::Card(rule) = sd("* name 1..* MS SU") else {
            panic!("expected a card rule");
        };
        assert_eq!(rule.element.value, "name");
        assert_eq!(rule.cardinality.min.as_ref().map(|m| m.value), Some(1));
        assert_eq!(
            rule.cardinality.max.as_ref().map(|m| m.value),
            Some(CardinalityMax::Unbounded)
        );
        assert_eq!(rule.flags.enabled(), vec![Flag::MustSupport, Flag::Summary]);
    }

    #[test]
    fn card_rule_with_one_sided_cardinality() {
        let SdRule::Card(rule) = sd("* name ..1") else {
            panic!("expected a card rule");
        };
        assert!(rule.cardinality.min.is_none());
        assert_eq!(
            rule.cardinality.max.map(|m| m.value),
            Some(CardinalityMax::Bounded(1))
        );
    }

    #[test]
    fn flag_rule_over_several_paths() {
        let SdRule::Flag(rule) = sd("* identifier and name and gender ?! MS") else {
            panic!("expected a flag rule");
        };
        let paths: Vec<_> = rule.elements.iter().map(|e| e.as_str()).collect();
        assert_eq!(paths, vec!["identifier", "name", "gender"]);
        assert_eq!(rule.flags.enabled(), vec![Flag::MustSupport, Flag::Modifier]);
    }

    #[test]
    fn binding_rule_with_strength() {
        let SdRule::Binding(rule) = sd("* code from http://example.org/vs|1.0 (extensible)") else {
            panic!("expected a binding rule");
        };
        assert_eq!(rule.value_set.value, "http://example.org/vs|1.0");
        assert_eq!(
            rule.strength.map(|s| s.value),
            Some(BindingStrength::Extensible)
        );
    }

    #[test]
    fn assignment_with_exactly() {
        let SdRule::Assignment(rule) = sd("* code = http://loinc.org#1234-5 \"Some code\" exactly")
        else {
            panic!("expected an assignment rule");
        };
        assert_eq!(rule.value.value, "http://loinc.org#1234-5 \"Some code\"");
        assert!(rule.exactly.value);
        assert!(rule.exactly.is_written());
    }

    #[test]
    fn assignment_of_ratio() {
        let SdRule::Assignment(rule) = sd("* valueRatio = 5 'mg' : 1 'mL'") else {
            panic!("expected an assignment rule");
        };
        assert_eq!(rule.value.value, "5 'mg' : 1 'mL'");
        assert!(!rule.exactly.is_written());
    }

    #[test]
    fn invalid_value_is_rejected() {
        let error = parse_rule("* status = #a #b", RuleContext::Instance).unwrap_err();
        assert_eq!(error.message, "'#a #b' is not a valid value");
        assert_eq!(error.column(), 12);
    }

    #[test]
    fn contains_rule_over_lines() {
        let SdRule::Contains(rule) =
            sd("* extension contains\n    race named race 0..1 MS and\n    birthsex 0..1")
        else {
            panic!("expected a contains rule");
        };
        assert_eq!(rule.items.len(), 2);
        assert_eq!(
            rule.items[0].local_name.as_ref().map(|n| n.as_str()),
            Some("race")
        );
        assert!(rule.items[0].flags.must_support.value);
        assert_eq!(rule.items[1].name.value, "birthsex");
        assert_eq!(rule.location.end.line, 3);
    }

    #[test]
    fn type_rule_with_references() {
        let SdRule::Type(rule) = sd("* subject only Reference(Patient or Group) or Canonical(Questionnaire) or string")
        else {
            panic!("expected a type rule");
        };
        assert_eq!(rule.types.len(), 3);
        assert!(
            matches!(&rule.types[0], DataType::Reference(inner) if inner.value == "Patient or Group")
        );
        assert!(matches!(&rule.types[1], DataType::Canonical(_)));
        assert!(matches!(&rule.types[2], DataType::Name(name) if name.value == "string"));

        let inner = rule.types[0].location().unwrap();
        assert_eq!(inner.start.column, 26);
    }

    #[test]
    fn obeys_with_and_without_path() {
        let SdRule::Obeys(rule) = sd("* obeys inv-1 and inv-2") else {
            panic!("expected an obeys rule");
        };
        assert!(rule.element.is_none());
        assert_eq!(rule.invariants.len(), 2);

        let SdRule::Obeys(rule) = sd("* name obeys inv-3") else {
            panic!("expected an obeys rule");
        };
        assert_eq!(rule.element.map(|e| e.value), Some("name".to_string()));
    }

    #[test]
    fn caret_rule_on_element() {
        let SdRule::CaretValue(rule) = sd("* name ^short = \"The name\"") else {
            panic!("expected a caret rule");
        };
        assert_eq!(rule.caret_path.value, "short");
        assert_eq!(rule.value.value, "\"The name\"");
        assert_eq!(rule.caret_path.location.map(|l| l.start.column), Some(9));
    }

    #[test]
    fn insert_rule_with_parameters() {
        let SdRule::Insert(rule) = sd("* name insert Named(first, [[a, b]], c\\)d)") else {
            panic!("expected an insert rule");
        };
        assert_eq!(rule.path.map(|p| p.value), Some("name".to_string()));
        let parameters: Vec<_> = rule.parameters.iter().map(|p| p.as_str()).collect();
        assert_eq!(parameters, vec!["first", "a, b", "c)d"]);
    }

    #[test]
    fn path_rule() {
        let SdRule::Path(rule) = sd("* extension[foo]") else {
            panic!("expected a path rule");
        };
        assert_eq!(rule.path.value, "extension[foo]");
    }

    #[test]
    fn element_named_like_keyword() {
        let SdRule::Card(rule) = sd("* system 1..1") else {
            panic!("expected a card rule");
        };
        assert_eq!(rule.element.value, "system");
    }

    #[test]
    fn add_element_only_in_logical_models() {
        let source = "* status 1..1 MS code \"Status\" \"\"\"The status\"\"\"";
        match parse_rule(source, RuleContext::LogicalModel) {
            Ok(RuleSetRule::Sd(SdRule::AddElement(rule))) => {
                assert_eq!(rule.short.value, "Status");
                assert_eq!(rule.definition.map(|d| d.value), Some("The status".to_string()));
                assert!(rule.flags.must_support.value);
            }
            other => panic!("expected an add element rule, got {other:?}"),
        }

        let (tokens, _) = lex(source);
        let mut cursor = Cursor::new(&tokens, source);
        let parsed = rule(&mut cursor, RuleContext::StructureDefinition).unwrap();
        assert!(matches!(parsed, RuleSetRule::Sd(SdRule::Card(_))));
        assert!(!cursor.rest().is_empty());
    }

    #[test]
    fn mapping_rule() {
        match parse_rule("* identifier -> \"PID-3\" \"patient id\" #lang", RuleContext::Mapping) {
            Ok(RuleSetRule::Mapping(rule)) => {
                assert_eq!(rule.path.map(|p| p.value), Some("identifier".to_string()));
                assert_eq!(rule.target.value, "PID-3");
                assert_eq!(rule.comment.map(|c| c.value), Some("patient id".to_string()));
                assert_eq!(rule.language.map(|l| l.value), Some("#lang".to_string()));
            }
            other => panic!("expected a mapping rule, got {other:?}"),
        }
    }

    #[test]
    fn unknown_continuation_is_an_error() {
        let error = parse_rule("* name \"oops\"", RuleContext::StructureDefinition).unwrap_err();
        assert_eq!(error.message, "expected a rule after the element path, found '\"oops\"'");
    }
}
