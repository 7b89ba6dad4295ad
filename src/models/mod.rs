//! Core data model for the expression engine
//!
//! Everything the pipeline passes between stages lives here: the closed
//! operator sets, the condition/action AST, parsed-expression metadata,
//! rule application results and the structured validation output.
//!
//! All field values are logically strings; coercion to a number happens
//! only inside the evaluator for the numeric comparison operators.

use serde::{Deserialize, Serialize};

pub mod channel;
pub mod epg;

pub use channel::Channel;
pub use epg::{EpgChannel, EpgProgram};

/// Comparison operator applied by a single condition.
///
/// Closed set: every positive operator has exactly one negation and
/// negating twice returns the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    NotStartsWith,
    EndsWith,
    NotEndsWith,
    Matches,
    NotMatches,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl FilterOperator {
    /// Return the negated counterpart. Numeric comparisons negate into
    /// their complement ordering so that double negation still holds.
    pub fn negate(self) -> Self {
        match self {
            FilterOperator::Equals => FilterOperator::NotEquals,
            FilterOperator::NotEquals => FilterOperator::Equals,
            FilterOperator::Contains => FilterOperator::NotContains,
            FilterOperator::NotContains => FilterOperator::Contains,
            FilterOperator::StartsWith => FilterOperator::NotStartsWith,
            FilterOperator::NotStartsWith => FilterOperator::StartsWith,
            FilterOperator::EndsWith => FilterOperator::NotEndsWith,
            FilterOperator::NotEndsWith => FilterOperator::EndsWith,
            FilterOperator::Matches => FilterOperator::NotMatches,
            FilterOperator::NotMatches => FilterOperator::Matches,
            FilterOperator::GreaterThan => FilterOperator::LessThanOrEqual,
            FilterOperator::LessThanOrEqual => FilterOperator::GreaterThan,
            FilterOperator::LessThan => FilterOperator::GreaterThanOrEqual,
            FilterOperator::GreaterThanOrEqual => FilterOperator::LessThan,
        }
    }

    /// True for the regex operators.
    pub fn is_regex(self) -> bool {
        matches!(self, FilterOperator::Matches | FilterOperator::NotMatches)
    }

    /// True for the numeric comparison operators.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            FilterOperator::GreaterThan
                | FilterOperator::GreaterThanOrEqual
                | FilterOperator::LessThan
                | FilterOperator::LessThanOrEqual
        )
    }

    /// Parse a canonical operator name. Fused negations (`not_equals`) are
    /// accepted for completeness even though the preprocessor rewrites them
    /// into the `not <operator>` modifier form.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "equals" => FilterOperator::Equals,
            "not_equals" => FilterOperator::NotEquals,
            "contains" => FilterOperator::Contains,
            "not_contains" => FilterOperator::NotContains,
            "starts_with" => FilterOperator::StartsWith,
            "not_starts_with" => FilterOperator::NotStartsWith,
            "ends_with" => FilterOperator::EndsWith,
            "not_ends_with" => FilterOperator::NotEndsWith,
            "matches" => FilterOperator::Matches,
            "not_matches" => FilterOperator::NotMatches,
            "greater_than" => FilterOperator::GreaterThan,
            "greater_than_or_equal" => FilterOperator::GreaterThanOrEqual,
            "less_than" => FilterOperator::LessThan,
            "less_than_or_equal" => FilterOperator::LessThanOrEqual,
            _ => return None,
        })
    }

    /// Canonical snake_case name, as used in the surface syntax.
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::NotEquals => "not_equals",
            FilterOperator::Contains => "contains",
            FilterOperator::NotContains => "not_contains",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::NotStartsWith => "not_starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::NotEndsWith => "not_ends_with",
            FilterOperator::Matches => "matches",
            FilterOperator::NotMatches => "not_matches",
            FilterOperator::GreaterThan => "greater_than",
            FilterOperator::GreaterThanOrEqual => "greater_than_or_equal",
            FilterOperator::LessThan => "less_than",
            FilterOperator::LessThanOrEqual => "less_than_or_equal",
        }
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical connective for condition groups. No others are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    And,
    Or,
}

impl std::fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicalOperator::And => write!(f, "AND"),
            LogicalOperator::Or => write!(f, "OR"),
        }
    }
}

/// Mutation operator applied by an action.
///
/// `Delete` takes no value; every other operator requires one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOperator {
    Set,
    SetIfEmpty,
    Append,
    Remove,
    Delete,
}

impl ActionOperator {
    /// Whether this operator takes a right-hand value.
    pub fn requires_value(self) -> bool {
        !matches!(self, ActionOperator::Delete)
    }

    /// Parse an action keyword (`SET`, `SET_IF_EMPTY`, …) in either case.
    pub fn parse_keyword(word: &str) -> Option<Self> {
        Some(match word {
            "SET" | "set" => ActionOperator::Set,
            "SET_IF_EMPTY" | "set_if_empty" => ActionOperator::SetIfEmpty,
            "APPEND" | "append" => ActionOperator::Append,
            "REMOVE" | "remove" => ActionOperator::Remove,
            "DELETE" | "delete" => ActionOperator::Delete,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionOperator::Set => "set",
            ActionOperator::SetIfEmpty => "set_if_empty",
            ActionOperator::Append => "append",
            ActionOperator::Remove => "remove",
            ActionOperator::Delete => "delete",
        }
    }

    /// Surface-syntax keyword form.
    pub fn keyword(self) -> &'static str {
        match self {
            ActionOperator::Set => "SET",
            ActionOperator::SetIfEmpty => "SET_IF_EMPTY",
            ActionOperator::Append => "APPEND",
            ActionOperator::Remove => "REMOVE",
            ActionOperator::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for ActionOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single node in the boolean predicate tree.
///
/// Negation is lowered onto the condition operator at parse time, so there
/// is no `Not` node. Consecutive same-operator binary operations are
/// flattened into one N-ary `Group` during parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionNode {
    Condition {
        field: String,
        operator: FilterOperator,
        value: String,
        case_sensitive: bool,
    },
    Group {
        operator: LogicalOperator,
        children: Vec<ConditionNode>,
    },
}

/// Root of the boolean predicate. A null root means the expression had no
/// condition text at all and matches every record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionTree {
    pub root: Option<ConditionNode>,
}

impl ConditionTree {
    pub fn empty() -> Self {
        Self { root: None }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

/// Reference to a value in the unified dynamic context, written
/// `@dynamic(path):key` in the surface syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicFieldRef {
    /// Original token text, kept for serialization and diagnostics.
    pub raw: String,
    /// Dot-separated path to the containing map, e.g. `request.headers`.
    pub path: String,
    /// Key looked up inside the map at `path`.
    pub key: String,
}

/// Right-hand side of an action.
///
/// The interpretation site (the rule processor) decides substitution:
/// capture references resolve against the match captures, field references
/// against the record, dynamic references against the dynamic registry.
/// Literals may still embed `$N` capture references and helper invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ActionValue {
    Literal(String),
    Null,
    /// `$field_name` — the current value of another field on the record.
    FieldRef(String),
    /// `$N` — the Nth regex capture (1-based; 0 is the full match).
    CaptureRef(usize),
    /// `@dynamic(path):key`
    DynamicRef(DynamicFieldRef),
}

impl ActionValue {
    /// Render the value back in surface syntax (used by the validator's
    /// serializable tree).
    pub fn display_text(&self) -> Option<String> {
        match self {
            ActionValue::Literal(s) => Some(s.clone()),
            ActionValue::Null => None,
            ActionValue::FieldRef(f) => Some(format!("${f}")),
            ActionValue::CaptureRef(i) => Some(format!("${i}")),
            ActionValue::DynamicRef(r) => Some(r.raw.clone()),
        }
    }
}

/// One field mutation. The target name resolves through field aliases
/// before the write happens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub field: String,
    pub operator: ActionOperator,
    /// `None` only for `DELETE`.
    pub value: Option<ActionValue>,
}

/// A parsed expression: a predicate, optionally followed by actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtendedExpression {
    ConditionOnly(ConditionTree),
    ConditionWithActions {
        condition: ConditionTree,
        actions: Vec<Action>,
    },
}

impl ExtendedExpression {
    pub fn condition_tree(&self) -> &ConditionTree {
        match self {
            ExtendedExpression::ConditionOnly(tree) => tree,
            ExtendedExpression::ConditionWithActions { condition, .. } => condition,
        }
    }

    pub fn actions(&self) -> &[Action] {
        match self {
            ExtendedExpression::ConditionOnly(_) => &[],
            ExtendedExpression::ConditionWithActions { actions, .. } => actions,
        }
    }
}

/// A parsed expression together with metadata derived from the AST during
/// parsing. Immutable and freely shareable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedExpression {
    /// The text handed to the parser (post-preprocessing).
    pub original_text: String,
    pub expression: ExtendedExpression,
    pub has_actions: bool,
    pub uses_regex: bool,
    /// Unique condition fields in insertion order.
    pub referenced_fields: Vec<String>,
    /// Action target fields in declaration order.
    pub modified_fields: Vec<String>,
}

impl ParsedExpression {
    pub fn condition_tree(&self) -> &ConditionTree {
        self.expression.condition_tree()
    }

    pub fn actions(&self) -> &[Action] {
        self.expression.actions()
    }
}

/// Outcome of evaluating a condition tree against one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationResult {
    pub matched: bool,
    /// Regex capture groups from the deciding condition; index 0 is the
    /// full match. Empty when no regex participated.
    pub captures: Vec<String>,
}

impl EvaluationResult {
    pub fn matched(captures: Vec<String>) -> Self {
        Self {
            matched: true,
            captures,
        }
    }

    pub fn unmatched() -> Self {
        Self {
            matched: false,
            captures: Vec::new(),
        }
    }
}

/// One applied field write, reported by the rule processor.
///
/// Emitted only when a write actually occurred; `SET_IF_EMPTY` against a
/// non-empty field emits nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldModification {
    pub field: String,
    pub old_value: String,
    pub new_value: String,
    pub operator: ActionOperator,
}

/// Result of applying one rule to one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleResult {
    pub matched: bool,
    pub modifications: Vec<FieldModification>,
    pub captures: Vec<String>,
}

/// Aggregate result of a full mapping-engine pass over one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingResult {
    pub rules_matched: usize,
    pub total_modifications: usize,
    pub modifications: Vec<FieldModification>,
}

/// Category of a validation diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionErrorCategory {
    /// General syntax issues: unclosed quotes, unbalanced parentheses,
    /// token/grammar mismatches.
    Syntax,
    /// Invalid or unknown field names.
    Field,
    /// Invalid or unknown operators / modifiers.
    Operator,
    /// Invalid values: unparseable regex, type mismatches.
    Value,
}

/// A structured validation diagnostic suitable for UI display and API
/// responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionValidationError {
    pub category: ExpressionErrorCategory,
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

/// Full validation outcome for one expression against one or more domains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpressionValidateResult {
    pub is_valid: bool,
    /// Preprocessed (canonical) expression text; present only when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_expression: Option<String>,
    pub errors: Vec<ExpressionValidationError>,
    /// Serializable AST for display; present only when parsing succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression_tree: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(FilterOperator::Equals)]
    #[case(FilterOperator::NotEquals)]
    #[case(FilterOperator::Contains)]
    #[case(FilterOperator::NotContains)]
    #[case(FilterOperator::StartsWith)]
    #[case(FilterOperator::NotStartsWith)]
    #[case(FilterOperator::EndsWith)]
    #[case(FilterOperator::NotEndsWith)]
    #[case(FilterOperator::Matches)]
    #[case(FilterOperator::NotMatches)]
    #[case(FilterOperator::GreaterThan)]
    #[case(FilterOperator::GreaterThanOrEqual)]
    #[case(FilterOperator::LessThan)]
    #[case(FilterOperator::LessThanOrEqual)]
    fn double_negation_is_identity(#[case] op: FilterOperator) {
        assert_eq!(op.negate().negate(), op);
    }

    #[test]
    fn regex_operator_classification() {
        for op in [FilterOperator::Matches, FilterOperator::NotMatches] {
            assert!(op.is_regex());
            assert!(!op.is_numeric());
        }
        assert!(!FilterOperator::Equals.is_regex());
    }

    #[test]
    fn numeric_operator_classification() {
        for op in [
            FilterOperator::GreaterThan,
            FilterOperator::GreaterThanOrEqual,
            FilterOperator::LessThan,
            FilterOperator::LessThanOrEqual,
        ] {
            assert!(op.is_numeric());
            assert!(!op.is_regex());
        }
    }

    #[test]
    fn operator_name_round_trip() {
        for op in [
            FilterOperator::Equals,
            FilterOperator::NotStartsWith,
            FilterOperator::GreaterThanOrEqual,
        ] {
            assert_eq!(FilterOperator::parse(op.as_str()), Some(op));
        }
        assert_eq!(FilterOperator::parse("containz"), None);
    }

    #[test]
    fn delete_takes_no_value() {
        assert!(!ActionOperator::Delete.requires_value());
        for op in [
            ActionOperator::Set,
            ActionOperator::SetIfEmpty,
            ActionOperator::Append,
            ActionOperator::Remove,
        ] {
            assert!(op.requires_value());
        }
    }

    #[test]
    fn keyword_parse_accepts_both_cases() {
        assert_eq!(
            ActionOperator::parse_keyword("SET_IF_EMPTY"),
            Some(ActionOperator::SetIfEmpty)
        );
        assert_eq!(
            ActionOperator::parse_keyword("delete"),
            Some(ActionOperator::Delete)
        );
        assert_eq!(ActionOperator::parse_keyword("Set"), None);
    }

    #[test]
    fn operator_serde_uses_snake_case() {
        let json = serde_json::to_string(&FilterOperator::NotStartsWith).unwrap();
        assert_eq!(json, "\"not_starts_with\"");
        let back: FilterOperator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FilterOperator::NotStartsWith);
    }
}
