//! Value set components, code system concepts and rules on codes.

use crate::ast::{
    CodeCaretValueRule, CodeInsertRule, Concept, ConceptRule, RuleSetRule, Text,
    ValueSetCodesSource, ValueSetComponent, ValueSetConcept, ValueSetFilter,
};
use crate::diagnostics::SyntaxError;
use crate::lexer::{Token, TokenKind};
use crate::location::ParsedElement;

use super::PResult;
use super::cursor::{Cursor, sub_text, text};
use super::rules::{self, RuleContext};

/// Parse a rule line whose first token is a code
///
/// Depending on what follows the codes this is a code caret rule, a code
/// insert rule, a value set component or a concept.
pub(crate) fn code_rule(cursor: &mut Cursor<'_>, context: RuleContext) -> PResult<RuleSetRule> {
    let mut count = 0;
    while cursor.nth_kind(count) == Some(TokenKind::Code) {
        count += 1;
    }

    match cursor.nth_kind(count) {
        Some(TokenKind::CaretPath) => code_caret_value_rule(cursor, count),
        Some(TokenKind::InsertKw) => code_insert_rule(cursor, count),
        _ if count == 1 && is_component(cursor, context) => {
            component(cursor).map(RuleSetRule::ValueSetComponent)
        }
        _ => concept(cursor, count).map(RuleSetRule::Concept),
    }
}

/// A single code reads as a value set component inside a value set, or
/// anywhere when a `from` clause follows.
fn is_component(cursor: &Cursor<'_>, context: RuleContext) -> bool {
    let from_after = |n| cursor.nth_kind(n) == Some(TokenKind::FromKw);
    context == RuleContext::ValueSet
        || from_after(1)
        || (cursor.nth_kind(1) == Some(TokenKind::String) && from_after(2))
}

fn codes(cursor: &mut Cursor<'_>, count: usize) -> PResult<Vec<Text>> {
    (0..count)
        .map(|_| cursor.expect(TokenKind::Code, "a code").map(text))
        .collect()
}

/// Grammar: CODE+ ^path = value
fn code_caret_value_rule(cursor: &mut Cursor<'_>, count: usize) -> PResult<RuleSetRule> {
    let concept_codes = codes(cursor, count)?;
    let caret_path = rules::caret_path(cursor)?;
    cursor.expect(TokenKind::Equal, "'='")?;
    let value = rules::value(cursor)?;

    Ok(RuleSetRule::CodeCaretValue(CodeCaretValueRule {
        concept_codes,
        caret_path,
        value,
        location: cursor.span(0),
    }))
}

/// Grammar: CODE+ insert NAME params?
fn code_insert_rule(cursor: &mut Cursor<'_>, count: usize) -> PResult<RuleSetRule> {
    let concept_codes = codes(cursor, count)?;
    let (rule_set_name, parameters) = rules::insert_target(cursor)?;

    Ok(RuleSetRule::CodeInsert(CodeInsertRule {
        concept_codes,
        rule_set_name,
        parameters,
        location: cursor.span(0),
    }))
}

/// Grammar: CODE+ STRING? (STRING | MULTILINE_STRING)?
///
/// All codes but the last name the ancestors of the new concept.
fn concept(cursor: &mut Cursor<'_>, count: usize) -> PResult<ConceptRule> {
    let mut hierarchy = codes(cursor, count)?;
    let Some(code) = hierarchy.pop() else {
        return Err(cursor.unexpected("a code"));
    };

    let display = rules::optional_string(cursor, false);
    let definition = rules::optional_string(cursor, true);

    Ok(ConceptRule {
        hierarchy,
        concept: Concept {
            code,
            display,
            definition,
            sub_concepts: Vec::new(),
            location: cursor.span(0),
        },
    })
}

/// Parse a value set component
///
/// Grammar: (include | exclude)? (CODE STRING? (from source)? | codes from source (where filter (and filter)*)?)
pub(crate) fn component(cursor: &mut Cursor<'_>) -> PResult<ValueSetComponent> {
    let include = match cursor.current_kind() {
        Some(TokenKind::IncludeKw | TokenKind::ExcludeKw) => {
            let token = cursor.bump().ok_or_else(|| cursor.unexpected("'include'"))?;
            ParsedElement::new(token.is(TokenKind::IncludeKw), token.location)
        }
        _ => ParsedElement::without_location(true),
    };

    let mut concept = None;
    let mut sources = Sources::default();
    let mut filters = Vec::new();

    if cursor.eat(TokenKind::CodesKw).is_some() {
        cursor.expect(TokenKind::FromKw, "'from'")?;
        sources = from_clause(cursor)?;
        if cursor.eat(TokenKind::WhereKw).is_some() {
            loop {
                filters.push(filter(cursor)?);
                if cursor.eat(TokenKind::AndKw).is_none() {
                    break;
                }
            }
        }
    } else {
        let code = cursor.expect(TokenKind::Code, "a code or 'codes'")?;
        let display = rules::optional_string(cursor, false);
        concept = Some(ValueSetConcept {
            code: text(code),
            display,
        });
        if cursor.eat(TokenKind::FromKw).is_some() {
            sources = from_clause(cursor)?;
        }
    }

    Ok(ValueSetComponent {
        include,
        concept,
        from_code_system: sources.system,
        from_value_sets: sources.value_sets,
        filters,
        location: cursor.span(0),
    })
}

#[derive(Default)]
struct Sources {
    system: Option<ValueSetCodesSource>,
    value_sets: Vec<ValueSetCodesSource>,
}

/// Grammar: (system NAME | valueset NAME (and NAME)*) (and ...)*
fn from_clause(cursor: &mut Cursor<'_>) -> PResult<Sources> {
    let mut sources = Sources::default();
    loop {
        match cursor.current_kind() {
            Some(TokenKind::SystemKw) => {
                let keyword = cursor.bump().ok_or_else(|| cursor.unexpected("'system'"))?;
                if sources.system.is_some() {
                    return Err(SyntaxError::syntax(
                        "a component can only include codes from one system",
                        keyword.location,
                    ));
                }
                sources.system = Some(codes_source(cursor, "a code system")?);
            }
            Some(TokenKind::ValueSetRefKw) => {
                cursor.bump();
                sources.value_sets.push(codes_source(cursor, "a value set")?);
                while cursor.at(TokenKind::AndKw) && is_plain_name(cursor.nth_kind(1)) {
                    cursor.bump();
                    sources.value_sets.push(codes_source(cursor, "a value set")?);
                }
            }
            _ => return Err(cursor.unexpected("'system' or 'valueset'")),
        }

        let another_source = matches!(
            cursor.nth_kind(1),
            Some(TokenKind::SystemKw | TokenKind::ValueSetRefKw)
        );
        if cursor.at(TokenKind::AndKw) && another_source {
            cursor.bump();
        } else {
            return Ok(sources);
        }
    }
}

fn is_plain_name(kind: Option<TokenKind>) -> bool {
    kind.is_some_and(|kind| {
        kind.is_name() && !matches!(kind, TokenKind::SystemKw | TokenKind::ValueSetRefKw)
    })
}

/// `name` or `name|version`
fn codes_source(cursor: &mut Cursor<'_>, expected: &str) -> PResult<ValueSetCodesSource> {
    let token = cursor.expect_where(TokenKind::is_name, expected)?;
    Ok(split_version(token))
}

fn split_version(token: &Token) -> ValueSetCodesSource {
    match token.text.split_once('|') {
        Some((name, _)) => ValueSetCodesSource {
            name: sub_text(token, 0..name.len()),
            version: Some(sub_text(token, name.len() + 1..token.text.len())),
        },
        None => ValueSetCodesSource {
            name: text(token),
            version: None,
        },
    }
}

/// Grammar: NAME operator value?
fn filter(cursor: &mut Cursor<'_>) -> PResult<ValueSetFilter> {
    let start = cursor.position();
    let property = cursor.expect_name("a filter property")?;
    let operator = cursor
        .expect_where(
            |kind| kind == TokenKind::Equal || kind.is_name(),
            "a filter operator",
        )
        .map(text)?;

    let value = filter_value(cursor)?;

    Ok(ValueSetFilter {
        property,
        operator,
        value,
        location: cursor.span(start),
    })
}

/// Every token up to `and` or the end of the line, as one source slice.
/// A code may carry its display: `#123 "Display"`.
fn filter_value(cursor: &mut Cursor<'_>) -> PResult<Option<Text>> {
    let start = cursor.position();
    while cursor
        .current()
        .is_some_and(|token| !token.is(TokenKind::AndKw))
    {
        cursor.bump();
    }
    let end = cursor.position();
    if start == end {
        return Ok(None);
    }

    let kinds: Vec<TokenKind> = cursor.tokens(start..end).iter().map(|t| t.kind).collect();
    let value = cursor.source_text(start..end);
    if !is_filter_value(&kinds) {
        return Err(SyntaxError::syntax(
            format!("'{}' is not a valid filter value", value.value),
            cursor.span(start),
        ));
    }
    Ok(Some(value))
}

fn is_filter_value(kinds: &[TokenKind]) -> bool {
    match kinds {
        [single] => {
            single.is_name()
                || matches!(
                    single,
                    TokenKind::Code | TokenKind::String | TokenKind::Regex
                )
        }
        [TokenKind::Code, TokenKind::String] => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn parse(source: &str, context: RuleContext) -> RuleSetRule {
        let (tokens, errors) = lex(source);
        assert!(errors.is_empty(), "{errors:?}");
        let mut cursor = Cursor::new(&tokens, source);
        let rule = rules::rule(&mut cursor, context).expect("rule parses");
        assert!(cursor.rest().is_empty(), "left over: {:?}", cursor.rest());
        rule
    }

    fn component_of(source: &str) -> ValueSetComponent {
        match parse(source, RuleContext::ValueSet) {
            RuleSetRule::ValueSetComponent(component) => component,
            other => panic!("expected a component, got {other:?}"),
        }
    }

    #[test]
    fn filter_component_with_sources() {
        let component = component_of(
            "* include codes from system http://snomed.info/sct|2024 and valueset OtherVS where concept is-a #123 and display regex /^a/",
        );
        assert!(component.include.value);
        assert!(component.include.is_written());
        assert!(component.concept.is_none());

        let system = component.from_code_system.expect("system");
        assert_eq!(system.name.value, "http://snomed.info/sct");
        assert_eq!(system.version.map(|v| v.value), Some("2024".to_string()));
        assert_eq!(component.from_value_sets.len(), 1);

        assert_eq!(component.filters.len(), 2);
        assert_eq!(component.filters[0].property.value, "concept");
        assert_eq!(component.filters[0].operator.value, "is-a");
        assert_eq!(
            component.filters[0].value.as_ref().map(|v| v.as_str()),
            Some("#123")
        );
        assert_eq!(
            component.filters[1].value.as_ref().map(|v| v.as_str()),
            Some("/^a/")
        );
    }

    #[test]
    fn filter_value_with_display() {
        let component = component_of(
            "* include codes from system S where concept is-a #123 \"Display\" and inactive = false",
        );
        assert_eq!(component.filters.len(), 2);
        let value = component.filters[0].value.as_ref().expect("filter value");
        assert_eq!(value.value, "#123 \"Display\"");
        assert_eq!(value.location.map(|l| l.start.column), Some(50));
        assert_eq!(
            component.filters[1].value.as_ref().map(|v| v.as_str()),
            Some("false")
        );
    }

    #[test]
    fn filter_value_of_two_codes_is_an_error() {
        let source = "* include codes from system S where concept is-a #1 #2";
        let (tokens, _) = lex(source);
        let mut cursor = Cursor::new(&tokens, source);
        let error = rules::rule(&mut cursor, RuleContext::ValueSet).unwrap_err();
        assert_eq!(error.message, "'#1 #2' is not a valid filter value");
    }

    #[test]
    fn concept_component_without_keyword() {
        let component = component_of("* http://loinc.org#1234-5 \"Some test\"");
        assert!(component.include.value);
        assert!(!component.include.is_written());
        let concept = component.concept.expect("concept");
        assert_eq!(concept.code.value, "http://loinc.org#1234-5");
        assert_eq!(concept.display.map(|d| d.value), Some("Some test".to_string()));
    }

    #[test]
    fn exclude_from_several_value_sets() {
        let component = component_of("* exclude codes from valueset A and B|2.0 and system S");
        assert!(!component.include.value);
        let names: Vec<_> = component
            .from_value_sets
            .iter()
            .map(|source| source.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(component.from_code_system.is_some());
    }

    #[test]
    fn duplicate_system_is_an_error() {
        let source = "* include codes from system A and system B";
        let (tokens, _) = lex(source);
        let mut cursor = Cursor::new(&tokens, source);
        let error = rules::rule(&mut cursor, RuleContext::ValueSet).unwrap_err();
        assert_eq!(error.column(), 35);
    }

    #[test]
    fn concept_with_display_and_definition() {
        let RuleSetRule::Concept(rule) =
            parse("* #active \"Active\" \"The thing is active\"", RuleContext::CodeSystem)
        else {
            panic!("expected a concept");
        };
        assert!(rule.hierarchy.is_empty());
        assert_eq!(rule.concept.name(), "active");
        assert_eq!(rule.concept.display.map(|d| d.value), Some("Active".to_string()));
        assert_eq!(
            rule.concept.definition.map(|d| d.value),
            Some("The thing is active".to_string())
        );
    }

    #[test]
    fn concept_with_only_multiline_definition() {
        let RuleSetRule::Concept(rule) =
            parse("* #a \"\"\"\n  Long text\n  \"\"\"", RuleContext::CodeSystem)
        else {
            panic!("expected a concept");
        };
        assert!(rule.concept.display.is_none());
        assert_eq!(rule.concept.definition.map(|d| d.value), Some("Long text".to_string()));
    }

    #[test]
    fn concept_hierarchy_codes() {
        let RuleSetRule::Concept(rule) = parse("* #parent #child \"Child\"", RuleContext::CodeSystem)
        else {
            panic!("expected a concept");
        };
        assert_eq!(rule.hierarchy.len(), 1);
        assert_eq!(rule.hierarchy[0].value, "#parent");
        assert_eq!(rule.concept.code.value, "#child");
    }

    #[test]
    fn code_caret_and_insert() {
        let RuleSetRule::CodeCaretValue(rule) =
            parse("* #a #b ^property[0].valueString = \"x\"", RuleContext::CodeSystem)
        else {
            panic!("expected a code caret rule");
        };
        assert_eq!(rule.concept_codes.len(), 2);
        assert_eq!(rule.caret_path.value, "property[0].valueString");

        let RuleSetRule::CodeInsert(rule) = parse("* #a insert Designations(de)", RuleContext::ValueSet)
        else {
            panic!("expected a code insert rule");
        };
        assert_eq!(rule.rule_set_name.value, "Designations");
        assert_eq!(rule.parameters[0].value, "de");
    }

    #[test]
    fn rule_set_line_with_from_is_component() {
        let rule = parse("* #a from system http://x", RuleContext::RuleSet);
        assert!(matches!(rule, RuleSetRule::ValueSetComponent(_)));
        let rule = parse("* #a \"A\"", RuleContext::RuleSet);
        assert!(matches!(rule, RuleSetRule::Concept(_)));
    }
}
