//! Entity headers, metadata lines and the builders that turn parsed rule
//! lines into entities.

use crate::ast::{
    Alias, CodeSystem, Concept, ConceptRule, EntityKind, Extension, FshDocument, Instance,
    InstanceRule, Invariant, Logical, Mapping, MappingEntityRule, MappingRules, Profile, Resource,
    RuleSet, RuleSetRule, SdRule, Text, ValueSet, VsRule, code_name,
};
use crate::diagnostics::SyntaxError;
use crate::lexer::{self, TokenKind};
use crate::location::{Location, ParsedElement};

use super::PResult;
use super::cursor::{Cursor, text};
use super::rules::{self, RuleContext};

/// `Keyword: Name` and, for rule sets, an optional parameter list.
pub(crate) struct Header {
    pub(crate) name: Text,
    pub(crate) parameters: Vec<Text>,
    pub(crate) location: Location,
}

pub(crate) fn header(cursor: &mut Cursor<'_>, kind: EntityKind) -> PResult<Header> {
    cursor.bump();
    let name = cursor.expect_name(&format!("{} {kind} name", kind.article()))?;
    let parameters = if kind == EntityKind::RuleSet && cursor.at(TokenKind::ParamOpen) {
        rules::parameters(cursor)?
    } else {
        Vec::new()
    };

    Ok(Header {
        name,
        parameters,
        location: cursor.span(0),
    })
}

/// Parse alias declaration: `Alias: $NAME = value`
pub(crate) fn alias(cursor: &mut Cursor<'_>) -> PResult<Alias> {
    cursor.expect(TokenKind::AliasKw, "'Alias:'")?;
    let name = cursor.expect_name("an alias name")?;
    cursor.expect(TokenKind::Equal, "'='")?;
    let value = cursor
        .expect_where(
            |kind| kind.is_name() || kind == TokenKind::Code,
            "an alias value",
        )
        .map(text)?;

    Ok(Alias {
        name,
        value,
        location: cursor.span(0),
    })
}

/// A metadata line such as `Title: "My profile"`.
#[derive(Debug)]
pub(crate) enum Metadata {
    Value(TokenKind, Text),
    /// `Context:` and `Characteristics:` take comma separated lists
    List(TokenKind, Vec<Text>),
}

pub(crate) fn metadata(cursor: &mut Cursor<'_>) -> PResult<Metadata> {
    let keyword = cursor
        .expect_where(TokenKind::is_metadata_keyword, "a metadata keyword")?
        .kind;

    let metadata = match keyword {
        TokenKind::TitleKw | TokenKind::ExpressionKw | TokenKind::XPathKw | TokenKind::TargetKw => {
            Metadata::Value(keyword, rules::string(cursor, "a quoted string")?)
        }
        TokenKind::DescriptionKw => {
            let description = rules::optional_string(cursor, true)
                .ok_or_else(|| cursor.unexpected("a quoted string"))?;
            Metadata::Value(keyword, description)
        }
        TokenKind::UsageKw | TokenKind::SeverityKw => {
            let code = cursor.expect(TokenKind::Code, "a code")?;
            Metadata::Value(keyword, text(code))
        }
        TokenKind::ContextKw => Metadata::List(keyword, list(cursor, context_item)?),
        TokenKind::CharacteristicsKw => Metadata::List(
            keyword,
            list(cursor, |cursor| {
                cursor.expect(TokenKind::Code, "a code").map(text)
            })?,
        ),
        _ => Metadata::Value(keyword, cursor.expect_name("a name")?),
    };
    Ok(metadata)
}

fn list(
    cursor: &mut Cursor<'_>,
    mut item: impl FnMut(&mut Cursor<'_>) -> PResult<Text>,
) -> PResult<Vec<Text>> {
    let mut items = vec![item(cursor)?];
    while cursor.eat(TokenKind::Comma).is_some() {
        items.push(item(cursor)?);
    }
    Ok(items)
}

/// An extension context: an element path, or a FHIRPath expression in
/// quotes.
fn context_item(cursor: &mut Cursor<'_>) -> PResult<Text> {
    let token = cursor.expect_where(
        |kind| kind == TokenKind::String || kind.is_name(),
        "an extension context",
    )?;
    Ok(if token.is(TokenKind::String) {
        ParsedElement::new(lexer::unquote_string(&token.text), token.location)
    } else {
        text(token)
    })
}

/// Collects the metadata and rules of one entity while its body is
/// parsed, then stores it in the document.
pub(crate) trait EntityBuilder: Sized {
    const KIND: EntityKind;
    /// How rule lines of this entity are read
    const RULES: RuleContext;
    /// Metadata keywords the entity accepts
    const METADATA: &'static [TokenKind];

    fn new(header: Header) -> Self;

    fn set_metadata(&mut self, metadata: Metadata);

    /// Add a rule written at `indent` columns, or explain why it does not
    /// belong here.
    fn add_rule(&mut self, rule: RuleSetRule, indent: usize) -> PResult<()>;

    fn finish(self, location: Location, document: &mut FshDocument);
}

/// Store a single valued metadata in the slot for its keyword. Later
/// lines overwrite earlier ones.
fn assign(metadata: Metadata, slots: &mut [(TokenKind, &mut Option<Text>)]) {
    if let Metadata::Value(keyword, value) = metadata
        && let Some((_, slot)) = slots.iter_mut().find(|(kind, _)| *kind == keyword)
    {
        **slot = Some(value);
    }
}

fn not_allowed(rule: &RuleSetRule, kind: EntityKind) -> SyntaxError {
    SyntaxError::syntax(
        format!(
            "{} is not allowed in {} {kind}",
            rule.describe(),
            kind.article()
        ),
        rule.location(),
    )
}

fn structure_rule(rule: RuleSetRule, kind: EntityKind) -> PResult<SdRule> {
    match rule {
        RuleSetRule::Sd(rule) => Ok(rule),
        other => Err(not_allowed(&other, kind)),
    }
}

fn instance_rule(rule: RuleSetRule, kind: EntityKind) -> PResult<InstanceRule> {
    match rule {
        RuleSetRule::Sd(SdRule::Assignment(rule)) => Ok(InstanceRule::Assignment(rule)),
        RuleSetRule::Sd(SdRule::Insert(rule)) => Ok(InstanceRule::Insert(rule)),
        RuleSetRule::Sd(SdRule::Path(rule)) => Ok(InstanceRule::Path(rule)),
        other => Err(not_allowed(&other, kind)),
    }
}

/// Caret and insert rules shared by value sets and code systems.
fn terminology_rule(rule: RuleSetRule, kind: EntityKind) -> PResult<VsRule> {
    match rule {
        RuleSetRule::Sd(SdRule::CaretValue(rule)) if rule.element.is_none() => {
            Ok(VsRule::CaretValue(rule))
        }
        RuleSetRule::Sd(SdRule::Insert(rule)) if rule.path.is_none() => Ok(VsRule::Insert(rule)),
        RuleSetRule::CodeCaretValue(rule) => Ok(VsRule::CodeCaretValue(rule)),
        RuleSetRule::CodeInsert(rule) => Ok(VsRule::CodeInsert(rule)),
        other => Err(not_allowed(&other, kind)),
    }
}

const STRUCTURE_METADATA: &[TokenKind] = &[
    TokenKind::ParentKw,
    TokenKind::IdKw,
    TokenKind::TitleKw,
    TokenKind::DescriptionKw,
];

impl EntityBuilder for Profile {
    const KIND: EntityKind = EntityKind::Profile;
    const RULES: RuleContext = RuleContext::StructureDefinition;
    const METADATA: &'static [TokenKind] = STRUCTURE_METADATA;

    fn new(header: Header) -> Self {
        Profile {
            name: header.name,
            parent: None,
            id: None,
            title: None,
            description: None,
            rules: Default::default(),
            location: header.location,
        }
    }

    fn set_metadata(&mut self, metadata: Metadata) {
        assign(
            metadata,
            &mut [
                (TokenKind::ParentKw, &mut self.parent),
                (TokenKind::IdKw, &mut self.id),
                (TokenKind::TitleKw, &mut self.title),
                (TokenKind::DescriptionKw, &mut self.description),
            ],
        );
    }

    fn add_rule(&mut self, rule: RuleSetRule, _indent: usize) -> PResult<()> {
        self.rules.push(structure_rule(rule, Self::KIND)?);
        Ok(())
    }

    fn finish(mut self, location: Location, document: &mut FshDocument) {
        self.location = location;
        document.profiles.push(self);
    }
}

impl EntityBuilder for Extension {
    const KIND: EntityKind = EntityKind::Extension;
    const RULES: RuleContext = RuleContext::StructureDefinition;
    const METADATA: &'static [TokenKind] = &[
        TokenKind::ParentKw,
        TokenKind::IdKw,
        TokenKind::TitleKw,
        TokenKind::DescriptionKw,
        TokenKind::ContextKw,
    ];

    fn new(header: Header) -> Self {
        Extension {
            name: header.name,
            parent: None,
            id: None,
            title: None,
            description: None,
            contexts: Vec::new(),
            rules: Default::default(),
            location: header.location,
        }
    }

    fn set_metadata(&mut self, metadata: Metadata) {
        match metadata {
            Metadata::List(TokenKind::ContextKw, contexts) => self.contexts = contexts,
            metadata => assign(
                metadata,
                &mut [
                    (TokenKind::ParentKw, &mut self.parent),
                    (TokenKind::IdKw, &mut self.id),
                    (TokenKind::TitleKw, &mut self.title),
                    (TokenKind::DescriptionKw, &mut self.description),
                ],
            ),
        }
    }

    fn add_rule(&mut self, rule: RuleSetRule, _indent: usize) -> PResult<()> {
        self.rules.push(structure_rule(rule, Self::KIND)?);
        Ok(())
    }

    fn finish(mut self, location: Location, document: &mut FshDocument) {
        self.location = location;
        document.extensions.push(self);
    }
}

impl EntityBuilder for Logical {
    const KIND: EntityKind = EntityKind::Logical;
    const RULES: RuleContext = RuleContext::LogicalModel;
    const METADATA: &'static [TokenKind] = &[
        TokenKind::ParentKw,
        TokenKind::IdKw,
        TokenKind::TitleKw,
        TokenKind::DescriptionKw,
        TokenKind::CharacteristicsKw,
    ];

    fn new(header: Header) -> Self {
        Logical {
            name: header.name,
            parent: None,
            id: None,
            title: None,
            description: None,
            characteristics: Vec::new(),
            rules: Default::default(),
            location: header.location,
        }
    }

    fn set_metadata(&mut self, metadata: Metadata) {
        match metadata {
            Metadata::List(TokenKind::CharacteristicsKw, codes) => self.characteristics = codes,
            metadata => assign(
                metadata,
                &mut [
                    (TokenKind::ParentKw, &mut self.parent),
                    (TokenKind::IdKw, &mut self.id),
                    (TokenKind::TitleKw, &mut self.title),
                    (TokenKind::DescriptionKw, &mut self.description),
                ],
            ),
        }
    }

    fn add_rule(&mut self, rule: RuleSetRule, _indent: usize) -> PResult<()> {
        self.rules.push(structure_rule(rule, Self::KIND)?);
        Ok(())
    }

    fn finish(mut self, location: Location, document: &mut FshDocument) {
        self.location = location;
        document.logicals.push(self);
    }
}

impl EntityBuilder for Resource {
    const KIND: EntityKind = EntityKind::Resource;
    const RULES: RuleContext = RuleContext::LogicalModel;
    const METADATA: &'static [TokenKind] = STRUCTURE_METADATA;

    fn new(header: Header) -> Self {
        Resource {
            name: header.name,
            parent: None,
            id: None,
            title: None,
            description: None,
            rules: Default::default(),
            location: header.location,
        }
    }

    fn set_metadata(&mut self, metadata: Metadata) {
        assign(
            metadata,
            &mut [
                (TokenKind::ParentKw, &mut self.parent),
                (TokenKind::IdKw, &mut self.id),
                (TokenKind::TitleKw, &mut self.title),
                (TokenKind::DescriptionKw, &mut self.description),
            ],
        );
    }

    fn add_rule(&mut self, rule: RuleSetRule, _indent: usize) -> PResult<()> {
        self.rules.push(structure_rule(rule, Self::KIND)?);
        Ok(())
    }

    fn finish(mut self, location: Location, document: &mut FshDocument) {
        self.location = location;
        document.resources.push(self);
    }
}

const TERMINOLOGY_METADATA: &[TokenKind] =
    &[TokenKind::IdKw, TokenKind::TitleKw, TokenKind::DescriptionKw];

impl EntityBuilder for ValueSet {
    const KIND: EntityKind = EntityKind::ValueSet;
    const RULES: RuleContext = RuleContext::ValueSet;
    const METADATA: &'static [TokenKind] = TERMINOLOGY_METADATA;

    fn new(header: Header) -> Self {
        ValueSet {
            name: header.name,
            id: None,
            title: None,
            description: None,
            include_components: Vec::new(),
            exclude_components: Vec::new(),
            rules: Default::default(),
            location: header.location,
        }
    }

    fn set_metadata(&mut self, metadata: Metadata) {
        assign(
            metadata,
            &mut [
                (TokenKind::IdKw, &mut self.id),
                (TokenKind::TitleKw, &mut self.title),
                (TokenKind::DescriptionKw, &mut self.description),
            ],
        );
    }

    fn add_rule(&mut self, rule: RuleSetRule, _indent: usize) -> PResult<()> {
        match rule {
            RuleSetRule::ValueSetComponent(component) if component.include.value => {
                self.include_components.push(component);
            }
            RuleSetRule::ValueSetComponent(component) => self.exclude_components.push(component),
            rule => self.rules.push(terminology_rule(rule, Self::KIND)?),
        }
        Ok(())
    }

    fn finish(mut self, location: Location, document: &mut FshDocument) {
        self.location = location;
        document.value_sets.push(self);
    }
}

/// Code system under construction.
///
/// Concepts nest by indentation: `open` holds the indentation and tree
/// path of each concept that can still receive children, innermost last.
pub(crate) struct CodeSystemBuilder {
    code_system: CodeSystem,
    open: Vec<(usize, Vec<usize>)>,
}

impl CodeSystemBuilder {
    fn add_concept(&mut self, rule: ConceptRule, indent: usize) -> PResult<()> {
        let ConceptRule {
            hierarchy,
            concept,
        } = rule;
        let mut path = self
            .open
            .last()
            .map(|(_, path)| path.clone())
            .unwrap_or_default();

        for ancestor in &hierarchy {
            let found = children(&self.code_system.concepts, &path).and_then(|siblings| {
                siblings
                    .iter()
                    .position(|c| code_name(&c.code.value) == code_name(&ancestor.value))
            });
            match found {
                Some(index) => path.push(index),
                None => {
                    let location = ancestor.location.unwrap_or(concept.location);
                    return Err(SyntaxError::syntax(
                        format!(
                            "cannot add {} under {}: no such concept",
                            concept.code.value, ancestor.value
                        ),
                        location,
                    ));
                }
            }
        }

        let location = concept.location;
        let siblings = children_mut(&mut self.code_system.concepts, &path)
            .ok_or_else(|| SyntaxError::syntax("concept parent is missing", location))?;
        siblings.push(concept);
        let index = siblings.len() - 1;

        for depth in 1..=path.len() {
            if let Some(ancestor) = concept_mut(&mut self.code_system.concepts, &path[..depth]) {
                ancestor.location = ancestor.location.cover(location);
            }
        }

        path.push(index);
        self.open.push((indent, path));
        Ok(())
    }
}

fn children<'c>(mut concepts: &'c [Concept], path: &[usize]) -> Option<&'c [Concept]> {
    for &index in path {
        concepts = &concepts.get(index)?.sub_concepts;
    }
    Some(concepts)
}

fn children_mut<'c>(
    mut concepts: &'c mut Vec<Concept>,
    path: &[usize],
) -> Option<&'c mut Vec<Concept>> {
    for &index in path {
        concepts = &mut concepts.get_mut(index)?.sub_concepts;
    }
    Some(concepts)
}

fn concept_mut<'c>(concepts: &'c mut Vec<Concept>, path: &[usize]) -> Option<&'c mut Concept> {
    let (last, parents) = path.split_last()?;
    children_mut(concepts, parents)?.get_mut(*last)
}

impl EntityBuilder for CodeSystemBuilder {
    const KIND: EntityKind = EntityKind::CodeSystem;
    const RULES: RuleContext = RuleContext::CodeSystem;
    const METADATA: &'static [TokenKind] = TERMINOLOGY_METADATA;

    fn new(header: Header) -> Self {
        CodeSystemBuilder {
            code_system: CodeSystem {
                name: header.name,
                id: None,
                title: None,
                description: None,
                concepts: Vec::new(),
                rules: Default::default(),
                location: header.location,
            },
            open: Vec::new(),
        }
    }

    fn set_metadata(&mut self, metadata: Metadata) {
        let code_system = &mut self.code_system;
        assign(
            metadata,
            &mut [
                (TokenKind::IdKw, &mut code_system.id),
                (TokenKind::TitleKw, &mut code_system.title),
                (TokenKind::DescriptionKw, &mut code_system.description),
            ],
        );
    }

    fn add_rule(&mut self, rule: RuleSetRule, indent: usize) -> PResult<()> {
        while self.open.last().is_some_and(|(open, _)| *open >= indent) {
            self.open.pop();
        }
        match rule {
            RuleSetRule::Concept(rule) => self.add_concept(rule, indent),
            rule => {
                let rule = terminology_rule(rule, Self::KIND)?;
                self.code_system.rules.push(rule);
                Ok(())
            }
        }
    }

    fn finish(self, location: Location, document: &mut FshDocument) {
        let mut code_system = self.code_system;
        code_system.location = location;
        document.code_systems.push(code_system);
    }
}

impl EntityBuilder for Instance {
    const KIND: EntityKind = EntityKind::Instance;
    const RULES: RuleContext = RuleContext::Instance;
    const METADATA: &'static [TokenKind] = &[
        TokenKind::InstanceOfKw,
        TokenKind::IdKw,
        TokenKind::TitleKw,
        TokenKind::DescriptionKw,
        TokenKind::UsageKw,
    ];

    fn new(header: Header) -> Self {
        Instance {
            name: header.name,
            instance_of: None,
            id: None,
            title: None,
            description: None,
            usage: None,
            rules: Default::default(),
            location: header.location,
        }
    }

    fn set_metadata(&mut self, metadata: Metadata) {
        assign(
            metadata,
            &mut [
                (TokenKind::InstanceOfKw, &mut self.instance_of),
                (TokenKind::IdKw, &mut self.id),
                (TokenKind::TitleKw, &mut self.title),
                (TokenKind::DescriptionKw, &mut self.description),
                (TokenKind::UsageKw, &mut self.usage),
            ],
        );
    }

    fn add_rule(&mut self, rule: RuleSetRule, _indent: usize) -> PResult<()> {
        self.rules.push(instance_rule(rule, Self::KIND)?);
        Ok(())
    }

    fn finish(mut self, location: Location, document: &mut FshDocument) {
        self.location = location;
        document.instances.push(self);
    }
}

impl EntityBuilder for Invariant {
    const KIND: EntityKind = EntityKind::Invariant;
    const RULES: RuleContext = RuleContext::Instance;
    const METADATA: &'static [TokenKind] = &[
        TokenKind::DescriptionKw,
        TokenKind::ExpressionKw,
        TokenKind::XPathKw,
        TokenKind::SeverityKw,
    ];

    fn new(header: Header) -> Self {
        Invariant {
            name: header.name,
            description: None,
            expression: None,
            xpath: None,
            severity: None,
            rules: Default::default(),
            location: header.location,
        }
    }

    fn set_metadata(&mut self, metadata: Metadata) {
        assign(
            metadata,
            &mut [
                (TokenKind::DescriptionKw, &mut self.description),
                (TokenKind::ExpressionKw, &mut self.expression),
                (TokenKind::XPathKw, &mut self.xpath),
                (TokenKind::SeverityKw, &mut self.severity),
            ],
        );
    }

    fn add_rule(&mut self, rule: RuleSetRule, _indent: usize) -> PResult<()> {
        self.rules.push(instance_rule(rule, Self::KIND)?);
        Ok(())
    }

    fn finish(mut self, location: Location, document: &mut FshDocument) {
        self.location = location;
        document.invariants.push(self);
    }
}

impl EntityBuilder for RuleSet {
    const KIND: EntityKind = EntityKind::RuleSet;
    const RULES: RuleContext = RuleContext::RuleSet;
    const METADATA: &'static [TokenKind] = &[];

    fn new(header: Header) -> Self {
        RuleSet {
            name: header.name,
            parameters: header.parameters,
            rules: Vec::new(),
            location: header.location,
        }
    }

    fn set_metadata(&mut self, _metadata: Metadata) {}

    fn add_rule(&mut self, rule: RuleSetRule, _indent: usize) -> PResult<()> {
        self.rules.push(rule);
        Ok(())
    }

    fn finish(mut self, location: Location, document: &mut FshDocument) {
        self.location = location;
        document.rule_sets.push(self);
    }
}

impl EntityBuilder for Mapping {
    const KIND: EntityKind = EntityKind::Mapping;
    const RULES: RuleContext = RuleContext::Mapping;
    const METADATA: &'static [TokenKind] = &[
        TokenKind::IdKw,
        TokenKind::SourceKw,
        TokenKind::TargetKw,
        TokenKind::TitleKw,
        TokenKind::DescriptionKw,
    ];

    fn new(header: Header) -> Self {
        Mapping {
            name: header.name,
            id: None,
            source: None,
            target: None,
            title: None,
            description: None,
            rules: MappingRules::default(),
            location: header.location,
        }
    }

    fn set_metadata(&mut self, metadata: Metadata) {
        assign(
            metadata,
            &mut [
                (TokenKind::IdKw, &mut self.id),
                (TokenKind::SourceKw, &mut self.source),
                (TokenKind::TargetKw, &mut self.target),
                (TokenKind::TitleKw, &mut self.title),
                (TokenKind::DescriptionKw, &mut self.description),
            ],
        );
    }

    fn add_rule(&mut self, rule: RuleSetRule, _indent: usize) -> PResult<()> {
        let rule = match rule {
            RuleSetRule::Mapping(rule) => MappingEntityRule::Mapping(rule),
            RuleSetRule::Sd(SdRule::Insert(rule)) => MappingEntityRule::Insert(rule),
            RuleSetRule::Sd(SdRule::Path(rule)) => MappingEntityRule::Path(rule),
            other => return Err(not_allowed(&other, Self::KIND)),
        };
        self.rules.push(rule);
        Ok(())
    }

    fn finish(mut self, location: Location, document: &mut FshDocument) {
        self.location = location;
        document.mappings.push(self);
    }
}
