//! Typed FSH syntax tree
//!
//! Every leaf is a [`ParsedElement`] so callers always know where a value
//! came from, and every entity and rule carries the [`Location`] of the
//! text it was parsed from. The tree is plain data: it is built once per
//! parse call and never mutated by the parser afterwards.

use crate::location::{Location, ParsedElement};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Text = ParsedElement<String>;

/// Result of parsing one FSH file.
///
/// Each entity kind has its own collection, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FshDocument {
    pub aliases: Vec<Alias>,
    pub profiles: Vec<Profile>,
    pub extensions: Vec<Extension>,
    pub logicals: Vec<Logical>,
    pub resources: Vec<Resource>,
    pub value_sets: Vec<ValueSet>,
    pub code_systems: Vec<CodeSystem>,
    pub instances: Vec<Instance>,
    pub invariants: Vec<Invariant>,
    pub rule_sets: Vec<RuleSet>,
    pub mappings: Vec<Mapping>,
}

impl FshDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entities().next().is_none()
    }

    /// All entities, grouped by kind in the order of the fields above.
    pub fn entities(&self) -> impl Iterator<Item = EntityRef<'_>> + '_ {
        let aliases = self.aliases.iter().map(EntityRef::Alias);
        let profiles = self.profiles.iter().map(EntityRef::Profile);
        let extensions = self.extensions.iter().map(EntityRef::Extension);
        let logicals = self.logicals.iter().map(EntityRef::Logical);
        let resources = self.resources.iter().map(EntityRef::Resource);
        let value_sets = self.value_sets.iter().map(EntityRef::ValueSet);
        let code_systems = self.code_systems.iter().map(EntityRef::CodeSystem);
        let instances = self.instances.iter().map(EntityRef::Instance);
        let invariants = self.invariants.iter().map(EntityRef::Invariant);
        let rule_sets = self.rule_sets.iter().map(EntityRef::RuleSet);
        let mappings = self.mappings.iter().map(EntityRef::Mapping);

        aliases
            .chain(profiles)
            .chain(extensions)
            .chain(logicals)
            .chain(resources)
            .chain(value_sets)
            .chain(code_systems)
            .chain(instances)
            .chain(invariants)
            .chain(rule_sets)
            .chain(mappings)
    }
}

/// Kinds of top-level declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Alias,
    Profile,
    Extension,
    Logical,
    Resource,
    ValueSet,
    CodeSystem,
    Instance,
    Invariant,
    RuleSet,
    Mapping,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Alias => "Alias",
            EntityKind::Profile => "Profile",
            EntityKind::Extension => "Extension",
            EntityKind::Logical => "Logical",
            EntityKind::Resource => "Resource",
            EntityKind::ValueSet => "ValueSet",
            EntityKind::CodeSystem => "CodeSystem",
            EntityKind::Instance => "Instance",
            EntityKind::Invariant => "Invariant",
            EntityKind::RuleSet => "RuleSet",
            EntityKind::Mapping => "Mapping",
        }
    }

    pub(crate) fn article(self) -> &'static str {
        match self {
            EntityKind::Alias
            | EntityKind::Extension
            | EntityKind::Instance
            | EntityKind::Invariant => "an",
            _ => "a",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed view over any entity, for code that treats them uniformly
/// (duplicate-name checks, required-metadata checks).
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Alias(&'a Alias),
    Profile(&'a Profile),
    Extension(&'a Extension),
    Logical(&'a Logical),
    Resource(&'a Resource),
    ValueSet(&'a ValueSet),
    CodeSystem(&'a CodeSystem),
    Instance(&'a Instance),
    Invariant(&'a Invariant),
    RuleSet(&'a RuleSet),
    Mapping(&'a Mapping),
}

impl<'a> EntityRef<'a> {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Alias(_) => EntityKind::Alias,
            EntityRef::Profile(_) => EntityKind::Profile,
            EntityRef::Extension(_) => EntityKind::Extension,
            EntityRef::Logical(_) => EntityKind::Logical,
            EntityRef::Resource(_) => EntityKind::Resource,
            EntityRef::ValueSet(_) => EntityKind::ValueSet,
            EntityRef::CodeSystem(_) => EntityKind::CodeSystem,
            EntityRef::Instance(_) => EntityKind::Instance,
            EntityRef::Invariant(_) => EntityKind::Invariant,
            EntityRef::RuleSet(_) => EntityKind::RuleSet,
            EntityRef::Mapping(_) => EntityKind::Mapping,
        }
    }

    pub fn name(&self) -> &'a Text {
        match self {
            EntityRef::Alias(e) => &e.name,
            EntityRef::Profile(e) => &e.name,
            EntityRef::Extension(e) => &e.name,
            EntityRef::Logical(e) => &e.name,
            EntityRef::Resource(e) => &e.name,
            EntityRef::ValueSet(e) => &e.name,
            EntityRef::CodeSystem(e) => &e.name,
            EntityRef::Instance(e) => &e.name,
            EntityRef::Invariant(e) => &e.name,
            EntityRef::RuleSet(e) => &e.name,
            EntityRef::Mapping(e) => &e.name,
        }
    }

    pub fn id(&self) -> Option<&'a Text> {
        match self {
            EntityRef::Profile(e) => e.id.as_ref(),
            EntityRef::Extension(e) => e.id.as_ref(),
            EntityRef::Logical(e) => e.id.as_ref(),
            EntityRef::Resource(e) => e.id.as_ref(),
            EntityRef::ValueSet(e) => e.id.as_ref(),
            EntityRef::CodeSystem(e) => e.id.as_ref(),
            EntityRef::Instance(e) => e.id.as_ref(),
            EntityRef::Mapping(e) => e.id.as_ref(),
            EntityRef::Alias(_) | EntityRef::Invariant(_) | EntityRef::RuleSet(_) => None,
        }
    }

    pub fn title(&self) -> Option<&'a Text> {
        match self {
            EntityRef::Profile(e) => e.title.as_ref(),
            EntityRef::Extension(e) => e.title.as_ref(),
            EntityRef::Logical(e) => e.title.as_ref(),
            EntityRef::Resource(e) => e.title.as_ref(),
            EntityRef::ValueSet(e) => e.title.as_ref(),
            EntityRef::CodeSystem(e) => e.title.as_ref(),
            EntityRef::Instance(e) => e.title.as_ref(),
            EntityRef::Mapping(e) => e.title.as_ref(),
            EntityRef::Alias(_) | EntityRef::Invariant(_) | EntityRef::RuleSet(_) => None,
        }
    }

    pub fn description(&self) -> Option<&'a Text> {
        match self {
            EntityRef::Profile(e) => e.description.as_ref(),
            EntityRef::Extension(e) => e.description.as_ref(),
            EntityRef::Logical(e) => e.description.as_ref(),
            EntityRef::Resource(e) => e.description.as_ref(),
            EntityRef::ValueSet(e) => e.description.as_ref(),
            EntityRef::CodeSystem(e) => e.description.as_ref(),
            EntityRef::Instance(e) => e.description.as_ref(),
            EntityRef::Invariant(e) => e.description.as_ref(),
            EntityRef::Mapping(e) => e.description.as_ref(),
            EntityRef::Alias(_) | EntityRef::RuleSet(_) => None,
        }
    }

    pub fn location(&self) -> Location {
        match self {
            EntityRef::Alias(e) => e.location,
            EntityRef::Profile(e) => e.location,
            EntityRef::Extension(e) => e.location,
            EntityRef::Logical(e) => e.location,
            EntityRef::Resource(e) => e.location,
            EntityRef::ValueSet(e) => e.location,
            EntityRef::CodeSystem(e) => e.location,
            EntityRef::Instance(e) => e.location,
            EntityRef::Invariant(e) => e.location,
            EntityRef::RuleSet(e) => e.location,
            EntityRef::Mapping(e) => e.location,
        }
    }
}

// ============================================================================
// Entities
// ============================================================================

/// `Alias: $LNC = http://loinc.org`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alias {
    pub name: Text,
    pub value: Text,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: Text,
    pub parent: Option<Text>,
    pub id: Option<Text>,
    pub title: Option<Text>,
    pub description: Option<Text>,
    pub rules: StructureDefRules,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    pub name: Text,
    pub parent: Option<Text>,
    pub id: Option<Text>,
    pub title: Option<Text>,
    pub description: Option<Text>,
    /// Values of the `Context:` keyword. Contexts set through caret rules
    /// stay in `rules`.
    pub contexts: Vec<Text>,
    pub rules: StructureDefRules,
    pub location: Location,
}

/// Logical model; its rules may add new elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Logical {
    pub name: Text,
    pub parent: Option<Text>,
    pub id: Option<Text>,
    pub title: Option<Text>,
    pub description: Option<Text>,
    pub characteristics: Vec<Text>,
    pub rules: StructureDefRules,
    pub location: Location,
}

/// Custom resource definition; its rules may add new elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub name: Text,
    pub parent: Option<Text>,
    pub id: Option<Text>,
    pub title: Option<Text>,
    pub description: Option<Text>,
    pub rules: StructureDefRules,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSet {
    pub name: Text,
    pub id: Option<Text>,
    pub title: Option<Text>,
    pub description: Option<Text>,
    pub include_components: Vec<ValueSetComponent>,
    pub exclude_components: Vec<ValueSetComponent>,
    pub rules: ValueSetRules,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeSystem {
    pub name: Text,
    pub id: Option<Text>,
    pub title: Option<Text>,
    pub description: Option<Text>,
    /// Top-level concepts; nested ones hang off [`Concept::sub_concepts`].
    pub concepts: Vec<Concept>,
    pub rules: CodeSystemRules,
    pub location: Location,
}

impl CodeSystem {
    /// Every concept in the hierarchy, parents before their children.
    pub fn all_concepts(&self) -> Vec<&Concept> {
        fn walk<'a>(concepts: &'a [Concept], out: &mut Vec<&'a Concept>) {
            for concept in concepts {
                out.push(concept);
                walk(&concept.sub_concepts, out);
            }
        }

        let mut out = Vec::new();
        walk(&self.concepts, &mut out);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub name: Text,
    pub instance_of: Option<Text>,
    pub id: Option<Text>,
    pub title: Option<Text>,
    pub description: Option<Text>,
    /// Code such as `#example` or `#definition`, as written
    pub usage: Option<Text>,
    pub rules: InstanceRules,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invariant {
    pub name: Text,
    pub description: Option<Text>,
    pub expression: Option<Text>,
    pub xpath: Option<Text>,
    /// `#error` or `#warning`, as written
    pub severity: Option<Text>,
    pub rules: InstanceRules,
    pub location: Location,
}

/// Named block of rules that `insert` rules copy into other entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    pub name: Text,
    /// Empty unless the rule set was declared as `RuleSet: Name(a, b)`
    pub parameters: Vec<Text>,
    pub rules: Vec<RuleSetRule>,
    pub location: Location,
}

impl RuleSet {
    pub fn is_parameterized(&self) -> bool {
        !self.parameters.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mapping {
    pub name: Text,
    pub id: Option<Text>,
    pub source: Option<Text>,
    pub target: Option<Text>,
    pub title: Option<Text>,
    pub description: Option<Text>,
    pub rules: MappingRules,
    pub location: Location,
}

// ============================================================================
// Rule containers
// ============================================================================

macro_rules! rule_container {
    ($(#[$meta:meta])* $container:ident, $rule:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $container {
            rules: Vec<$rule>,
        }

        impl $container {
            pub fn push(&mut self, rule: $rule) {
                self.rules.push(rule);
            }

            /// Rules in source order.
            pub fn iter(&self) -> std::slice::Iter<'_, $rule> {
                self.rules.iter()
            }

            pub fn len(&self) -> usize {
                self.rules.len()
            }

            pub fn is_empty(&self) -> bool {
                self.rules.is_empty()
            }
        }

        impl<'a> IntoIterator for &'a $container {
            type Item = &'a $rule;
            type IntoIter = std::slice::Iter<'a, $rule>;

            fn into_iter(self) -> Self::IntoIter {
                self.rules.iter()
            }
        }
    };
}

macro_rules! rule_views {
    ($container:ident, $rule:ident { $($method:ident => $variant:ident($ty:ty)),* $(,)? }) => {
        impl $container {
            $(
                pub fn $method(&self) -> impl Iterator<Item = &$ty> + '_ {
                    self.rules.iter().filter_map(|rule| match rule {
                        $rule::$variant(inner) => Some(inner),
                        _ => None,
                    })
                }
            )*
        }
    };
}

rule_container!(
    /// Rules of profiles, extensions, logical models and resources.
    StructureDefRules,
    SdRule
);
rule_container!(ValueSetRules, VsRule);
rule_container!(
    /// Caret and insert rules of a code system. Concepts live in
    /// [`CodeSystem::concepts`].
    CodeSystemRules,
    VsRule
);
rule_container!(InstanceRules, InstanceRule);
rule_container!(MappingRules, MappingEntityRule);

rule_views!(StructureDefRules, SdRule {
    card_rules => Card(CardRule),
    flag_rules => Flag(FlagRule),
    binding_rules => Binding(BindingRule),
    assignment_rules => Assignment(AssignmentRule),
    contains_rules => Contains(ContainsRule),
    type_rules => Type(TypeRule),
    obeys_rules => Obeys(ObeysRule),
    caret_value_rules => CaretValue(CaretValueRule),
    insert_rules => Insert(InsertRule),
    path_rules => Path(PathRule),
    add_element_rules => AddElement(AddElementRule),
});

rule_views!(ValueSetRules, VsRule {
    caret_value_rules => CaretValue(CaretValueRule),
    code_caret_value_rules => CodeCaretValue(CodeCaretValueRule),
    insert_rules => Insert(InsertRule),
    code_insert_rules => CodeInsert(CodeInsertRule),
});

rule_views!(CodeSystemRules, VsRule {
    caret_value_rules => CaretValue(CaretValueRule),
    code_caret_value_rules => CodeCaretValue(CodeCaretValueRule),
    insert_rules => Insert(InsertRule),
    code_insert_rules => CodeInsert(CodeInsertRule),
});

rule_views!(InstanceRules, InstanceRule {
    assignment_rules => Assignment(AssignmentRule),
    insert_rules => Insert(InsertRule),
    path_rules => Path(PathRule),
});

rule_views!(MappingRules, MappingEntityRule {
    mapping_rules => Mapping(MappingRule),
    insert_rules => Insert(InsertRule),
    path_rules => Path(PathRule),
});

/// Rule allowed in a structure definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SdRule {
    Card(CardRule),
    Flag(FlagRule),
    Binding(BindingRule),
    Assignment(AssignmentRule),
    Contains(ContainsRule),
    Type(TypeRule),
    Obeys(ObeysRule),
    CaretValue(CaretValueRule),
    Insert(InsertRule),
    Path(PathRule),
    /// Only in logical models and resources
    AddElement(AddElementRule),
}

impl SdRule {
    pub fn location(&self) -> Location {
        match self {
            SdRule::Card(rule) => rule.location,
            SdRule::Flag(rule) => rule.location,
            SdRule::Binding(rule) => rule.location,
            SdRule::Assignment(rule) => rule.location,
            SdRule::Contains(rule) => rule.location,
            SdRule::Type(rule) => rule.location,
            SdRule::Obeys(rule) => rule.location,
            SdRule::CaretValue(rule) => rule.location,
            SdRule::Insert(rule) => rule.location,
            SdRule::Path(rule) => rule.location,
            SdRule::AddElement(rule) => rule.location,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            SdRule::Card(_) => "cardinality rule",
            SdRule::Flag(_) => "flag rule",
            SdRule::Binding(_) => "binding rule",
            SdRule::Assignment(_) => "assignment rule",
            SdRule::Contains(_) => "contains rule",
            SdRule::Type(_) => "type rule",
            SdRule::Obeys(_) => "obeys rule",
            SdRule::CaretValue(_) => "caret value rule",
            SdRule::Insert(_) => "insert rule",
            SdRule::Path(_) => "path rule",
            SdRule::AddElement(_) => "add element rule",
        }
    }
}

/// Rule allowed in a value set or code system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VsRule {
    CaretValue(CaretValueRule),
    CodeCaretValue(CodeCaretValueRule),
    Insert(InsertRule),
    CodeInsert(CodeInsertRule),
}

impl VsRule {
    pub fn location(&self) -> Location {
        match self {
            VsRule::CaretValue(rule) => rule.location,
            VsRule::CodeCaretValue(rule) => rule.location,
            VsRule::Insert(rule) => rule.location,
            VsRule::CodeInsert(rule) => rule.location,
        }
    }
}

/// Rule allowed in an instance or invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InstanceRule {
    Assignment(AssignmentRule),
    Insert(InsertRule),
    Path(PathRule),
}

impl InstanceRule {
    pub fn location(&self) -> Location {
        match self {
            InstanceRule::Assignment(rule) => rule.location,
            InstanceRule::Insert(rule) => rule.location,
            InstanceRule::Path(rule) => rule.location,
        }
    }
}

/// Rule allowed in a mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MappingEntityRule {
    Mapping(MappingRule),
    Insert(InsertRule),
    Path(PathRule),
}

impl MappingEntityRule {
    pub fn location(&self) -> Location {
        match self {
            MappingEntityRule::Mapping(rule) => rule.location,
            MappingEntityRule::Insert(rule) => rule.location,
            MappingEntityRule::Path(rule) => rule.location,
        }
    }
}

/// Any rule line. Rule set bodies are not tied to one entity kind, so
/// they keep whatever each line parsed as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum RuleSetRule {
    Sd(SdRule),
    Concept(ConceptRule),
    ValueSetComponent(ValueSetComponent),
    CodeCaretValue(CodeCaretValueRule),
    CodeInsert(CodeInsertRule),
    Mapping(MappingRule),
}

impl RuleSetRule {
    pub fn location(&self) -> Location {
        match self {
            RuleSetRule::Sd(rule) => rule.location(),
            RuleSetRule::Concept(rule) => rule.concept.location,
            RuleSetRule::ValueSetComponent(rule) => rule.location,
            RuleSetRule::CodeCaretValue(rule) => rule.location,
            RuleSetRule::CodeInsert(rule) => rule.location,
            RuleSetRule::Mapping(rule) => rule.location,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            RuleSetRule::Sd(rule) => rule.describe(),
            RuleSetRule::Concept(_) => "concept",
            RuleSetRule::ValueSetComponent(_) => "value set component",
            RuleSetRule::CodeCaretValue(_) => "code caret value rule",
            RuleSetRule::CodeInsert(_) => "code insert rule",
            RuleSetRule::Mapping(_) => "mapping rule",
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

/// `* path 0..1 MS`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRule {
    pub element: Text,
    pub cardinality: Cardinality,
    pub flags: Flags,
    pub location: Location,
}

/// `* path MS SU` or `* a and b MS`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagRule {
    pub elements: Vec<Text>,
    pub flags: Flags,
    pub location: Location,
}

/// `* path from ValueSet (required)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingRule {
    pub bindable: Text,
    pub value_set: Text,
    pub strength: Option<ParsedElement<BindingStrength>>,
    pub location: Location,
}

/// `* path = value` with an optional trailing `exactly`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRule {
    pub element: Text,
    /// Source text of the whole value, e.g. `10.5 'mg'`
    pub value: Text,
    pub exactly: ParsedElement<bool>,
    pub location: Location,
}

/// `* extension contains a 0..1 and b named bee 1..1 MS`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainsRule {
    pub element: Text,
    pub items: Vec<ContainsItem>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainsItem {
    pub name: Text,
    /// Slice name given with `named`
    pub local_name: Option<Text>,
    pub cardinality: Cardinality,
    pub flags: Flags,
    pub location: Location,
}

/// `* value[x] only Quantity or Reference(Patient)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRule {
    pub element: Text,
    pub types: Vec<DataType>,
    pub location: Location,
}

/// `* obeys inv-1` or `* path obeys inv-1 and inv-2`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObeysRule {
    pub element: Option<Text>,
    pub invariants: Vec<Text>,
    pub location: Location,
}

/// `* ^status = #draft` or `* path ^short = "text"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaretValueRule {
    /// `None` when the caret path applies to the entity itself
    pub element: Option<Text>,
    /// Path without the leading `^`
    pub caret_path: Text,
    pub value: Text,
    pub location: Location,
}

/// `* #code ^property = value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeCaretValueRule {
    pub concept_codes: Vec<Text>,
    pub caret_path: Text,
    pub value: Text,
    pub location: Location,
}

/// `* insert Name` or `* path insert Name(a, b)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRule {
    pub path: Option<Text>,
    pub rule_set_name: Text,
    pub parameters: Vec<Text>,
    pub location: Location,
}

/// `* #code insert Name(a)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeInsertRule {
    pub concept_codes: Vec<Text>,
    pub rule_set_name: Text,
    pub parameters: Vec<Text>,
    pub location: Location,
}

/// A path on its own, used to set the context for indented rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathRule {
    pub path: Text,
    pub location: Location,
}

/// `* path 0..1 MS string or Coding "short" "definition"` in logical
/// models and resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddElementRule {
    pub path: Text,
    pub cardinality: Cardinality,
    pub flags: Flags,
    pub types: Vec<DataType>,
    /// Target of `contentReference` when used instead of types
    pub content_reference: Option<Text>,
    pub short: Text,
    pub definition: Option<Text>,
    pub location: Location,
}

/// `* path -> "target" "comment" #language`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingRule {
    pub path: Option<Text>,
    pub target: Text,
    pub comment: Option<Text>,
    pub language: Option<Text>,
    pub location: Location,
}

/// A code system concept and the concepts nested under it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    /// Code as written, including the `#`
    pub code: Text,
    pub display: Option<Text>,
    pub definition: Option<Text>,
    pub sub_concepts: Vec<Concept>,
    /// Covers the concept line and all nested concepts
    pub location: Location,
}

impl Concept {
    /// The code without its `#` prefix and quotes.
    pub fn name(&self) -> &str {
        code_name(&self.code.value)
    }
}

/// A concept line. `hierarchy` holds the ancestor codes of the explicit
/// `* #parent #child` form, outermost first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptRule {
    pub hierarchy: Vec<Text>,
    pub concept: Concept,
}

/// Code part of a code token: `http://x#abc` and `#"abc"` both give `abc`.
pub fn code_name(code: &str) -> &str {
    let after_hash = code.split_once('#').map_or(code, |(_, name)| name);
    after_hash
        .strip_prefix('"')
        .and_then(|name| name.strip_suffix('"'))
        .unwrap_or(after_hash)
}

/// One `include`/`exclude` line of a value set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSetComponent {
    /// `true` for include. Unwritten when the line has no keyword.
    pub include: ParsedElement<bool>,
    /// Set for single-concept components, unset for `codes from`
    pub concept: Option<ValueSetConcept>,
    pub from_code_system: Option<ValueSetCodesSource>,
    pub from_value_sets: Vec<ValueSetCodesSource>,
    pub filters: Vec<ValueSetFilter>,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSetConcept {
    /// Code as written, including any system prefix
    pub code: Text,
    pub display: Option<Text>,
}

/// Code system or value set reference with an optional `|version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSetCodesSource {
    pub name: Text,
    pub version: Option<Text>,
}

/// `where concept is-a #code`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSetFilter {
    pub property: Text,
    pub operator: Text,
    pub value: Option<Text>,
    pub location: Location,
}

// ============================================================================
// Composite values
// ============================================================================

/// One entry of a type list. Wrapped forms hold their inner text, so
/// `Reference(Patient or Group)` holds `Patient or Group`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum DataType {
    Name(Text),
    Reference(Text),
    Canonical(Text),
    CodeableReference(Text),
}

impl DataType {
    pub fn value(&self) -> &Text {
        match self {
            DataType::Name(value)
            | DataType::Reference(value)
            | DataType::Canonical(value)
            | DataType::CodeableReference(value) => value,
        }
    }

    pub fn location(&self) -> Option<Location> {
        self.value().location
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CardinalityMax {
    Bounded(u32),
    /// `*`
    Unbounded,
}

impl fmt::Display for CardinalityMax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardinalityMax::Bounded(max) => write!(f, "{max}"),
            CardinalityMax::Unbounded => f.write_str("*"),
        }
    }
}

/// `min..max`. Either side may be left out (`..1`, `1..`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cardinality {
    pub min: Option<ParsedElement<u32>>,
    pub max: Option<ParsedElement<CardinalityMax>>,
    pub location: Location,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(min) = &self.min {
            write!(f, "{}", min.value)?;
        }
        f.write_str("..")?;
        if let Some(max) = &self.max {
            write!(f, "{}", max.value)?;
        }
        Ok(())
    }
}

/// Element flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Flag {
    /// `MS`
    MustSupport,
    /// `SU`
    Summary,
    /// `?!`
    Modifier,
    /// `N`
    Normative,
    /// `TU`
    TrialUse,
    /// `D`
    Draft,
}

impl Flag {
    pub const ALL: [Flag; 6] = [
        Flag::MustSupport,
        Flag::Summary,
        Flag::Modifier,
        Flag::Normative,
        Flag::TrialUse,
        Flag::Draft,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Flag::MustSupport => "MS",
            Flag::Summary => "SU",
            Flag::Modifier => "?!",
            Flag::Normative => "N",
            Flag::TrialUse => "TU",
            Flag::Draft => "D",
        }
    }
}

/// The six flags of one rule. Unwritten flags are `false` with no location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flags {
    pub must_support: ParsedElement<bool>,
    pub summary: ParsedElement<bool>,
    pub modifier: ParsedElement<bool>,
    pub normative: ParsedElement<bool>,
    pub trial_use: ParsedElement<bool>,
    pub draft: ParsedElement<bool>,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            must_support: ParsedElement::without_location(false),
            summary: ParsedElement::without_location(false),
            modifier: ParsedElement::without_location(false),
            normative: ParsedElement::without_location(false),
            trial_use: ParsedElement::without_location(false),
            draft: ParsedElement::without_location(false),
        }
    }
}

impl Flags {
    fn slot(&mut self, flag: Flag) -> &mut ParsedElement<bool> {
        match flag {
            Flag::MustSupport => &mut self.must_support,
            Flag::Summary => &mut self.summary,
            Flag::Modifier => &mut self.modifier,
            Flag::Normative => &mut self.normative,
            Flag::TrialUse => &mut self.trial_use,
            Flag::Draft => &mut self.draft,
        }
    }

    pub fn get(&self, flag: Flag) -> &ParsedElement<bool> {
        match flag {
            Flag::MustSupport => &self.must_support,
            Flag::Summary => &self.summary,
            Flag::Modifier => &self.modifier,
            Flag::Normative => &self.normative,
            Flag::TrialUse => &self.trial_use,
            Flag::Draft => &self.draft,
        }
    }

    /// Mark `flag` as written at `location`. A repeated flag keeps its
    /// first location.
    pub fn set(&mut self, flag: Flag, location: Location) {
        let slot = self.slot(flag);
        if !slot.value {
            *slot = ParsedElement::new(true, location);
        }
    }

    /// Written flags in canonical order.
    pub fn enabled(&self) -> Vec<Flag> {
        Flag::ALL
            .into_iter()
            .filter(|flag| self.get(*flag).value)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.enabled().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BindingStrength {
    Required,
    Extensible,
    Preferred,
    Example,
}

impl BindingStrength {
    pub fn as_str(self) -> &'static str {
        match self {
            BindingStrength::Required => "required",
            BindingStrength::Extensible => "extensible",
            BindingStrength::Preferred => "preferred",
            BindingStrength::Example => "example",
        }
    }
}

impl std::str::FromStr for BindingStrength {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "required" => Ok(BindingStrength::Required),
            "extensible" => Ok(BindingStrength::Extensible),
            "preferred" => Ok(BindingStrength::Preferred),
            "example" => Ok(BindingStrength::Example),
            other => Err(format!("unknown binding strength '{other}'")),
        }
    }
}

impl fmt::Display for BindingStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::Position;

    fn loc(column: usize) -> Location {
        let start = Position::new(1, column, column - 1);
        let end = Position::new(1, column + 2, column + 1);
        Location::new(start, end)
    }

    #[test]
    fn default_flags_are_unwritten() {
        let flags = Flags::default();
        assert!(flags.is_empty());
        for flag in Flag::ALL {
            assert!(!flags.get(flag).value);
            assert!(!flags.get(flag).is_written());
        }
    }

    #[test]
    fn flag_order_does_not_matter() {
        let mut first = Flags::default();
        first.set(Flag::MustSupport, loc(10));
        first.set(Flag::Summary, loc(13));

        let mut second = Flags::default();
        second.set(Flag::Summary, loc(10));
        second.set(Flag::MustSupport, loc(13));

        assert_eq!(first.enabled(), second.enabled());
        assert_eq!(first.enabled(), vec![Flag::MustSupport, Flag::Summary]);
    }

    #[test]
    fn repeated_flag_keeps_first_location() {
        let mut flags = Flags::default();
        flags.set(Flag::Draft, loc(5));
        flags.set(Flag::Draft, loc(9));
        assert_eq!(flags.draft.location, Some(loc(5)));
    }

    #[test]
    fn code_name_strips_system_and_quotes() {
        assert_eq!(code_name("#active"), "active");
        assert_eq!(code_name("http://loinc.org#1234-5"), "1234-5");
        assert_eq!(code_name("#\"with space\""), "with space");
    }

    #[test]
    fn cardinality_display() {
        let cardinality = Cardinality {
            min: Some(ParsedElement::new(0, loc(3))),
            max: Some(ParsedElement::new(CardinalityMax::Unbounded, loc(6))),
            location: loc(3),
        };
        assert_eq!(cardinality.to_string(), "0..*");
    }

    #[test]
    fn strength_from_str() {
        assert_eq!(
            "required".parse::<BindingStrength>(),
            Ok(BindingStrength::Required)
        );
        assert!("mandatory".parse::<BindingStrength>().is_err());
    }

    #[test]
    fn empty_document_has_no_entities() {
        assert!(FshDocument::new().is_empty());
    }
}
