//! Expression validator
//!
//! Parses an expression for one or more expression domains and returns
//! structured diagnostics suitable for UI display and API responses:
//! syntax errors with positions and context windows, unknown fields with
//! similarity suggestions, read-only violations, invalid regex patterns,
//! plus a serializable AST and the canonical (preprocessed) text when the
//! expression is valid.
//!
//! Runtime evaluation stays permissive about unknown fields; the
//! validator is where authoring mistakes are caught.

use std::collections::BTreeSet;

use serde_json::json;

use crate::errors::ExpressionError;
use crate::expression::parser::ExpressionParser;
use crate::expression::preprocessor::preprocess_expression;
use crate::expression::ExpressionDomain;
use crate::field_registry::FieldRegistry;
use crate::models::{
    Action, ConditionNode, ExpressionErrorCategory, ExpressionValidateResult,
    ExpressionValidationError, ExtendedExpression, ParsedExpression,
};

/// Minimum character-overlap score for an unknown-field suggestion.
const SUGGESTION_THRESHOLD: u32 = 55;

/// Characters of context shown on each side of a syntax error position.
const CONTEXT_WINDOW: usize = 20;

/// Validator bound to the field set of one or more expression domains.
pub struct ExpressionValidator {
    valid_fields: BTreeSet<String>,
}

impl ExpressionValidator {
    /// Build a validator for the union of the given domains' field sets
    /// (canonical names and aliases).
    pub fn for_domains(domains: &[ExpressionDomain]) -> Self {
        let mut valid_fields = BTreeSet::new();
        for domain in domains {
            valid_fields.extend(domain.valid_field_names());
        }
        Self { valid_fields }
    }

    /// Preprocess, parse and check the expression. All detected problems
    /// are reported together rather than failing on the first.
    pub fn validate(&self, raw: &str) -> ExpressionValidateResult {
        let canonical = preprocess_expression(raw);

        // Structural pre-scan: unbalanced parentheses and unclosed
        // quotes can all be reported at once, where the fail-fast parser
        // would stop at the first.
        let structural = scan_structural_errors(&canonical);
        if !structural.is_empty() {
            return ExpressionValidateResult {
                is_valid: false,
                canonical_expression: None,
                errors: structural,
                expression_tree: None,
            };
        }

        let parser = ExpressionParser::new();
        let parsed = match parser.parse_extended(&canonical) {
            Ok(parsed) => parsed,
            Err(error) => {
                return ExpressionValidateResult {
                    is_valid: false,
                    canonical_expression: None,
                    errors: vec![syntax_error(&canonical, &error)],
                    expression_tree: None,
                };
            }
        };

        let mut errors = Vec::new();
        self.check_fields(&parsed, &mut errors);
        self.check_read_only_targets(parsed.actions(), &mut errors);
        check_regex_patterns(&parsed, &mut errors);

        let is_valid = errors.is_empty();
        ExpressionValidateResult {
            is_valid,
            canonical_expression: is_valid.then_some(canonical),
            errors,
            expression_tree: Some(serialize_tree(&parsed.expression)),
        }
    }

    pub(crate) fn check_fields(
        &self,
        parsed: &ParsedExpression,
        errors: &mut Vec<ExpressionValidationError>,
    ) {
        for field in parsed
            .referenced_fields
            .iter()
            .chain(parsed.modified_fields.iter())
        {
            if !self.valid_fields.contains(field) {
                errors.push(self.unknown_field_error(field));
            }
        }
    }

    fn check_read_only_targets(
        &self,
        actions: &[Action],
        errors: &mut Vec<ExpressionValidationError>,
    ) {
        let registry = FieldRegistry::global();
        for action in actions {
            if registry.is_read_only(&action.field) {
                errors.push(ExpressionValidationError {
                    category: ExpressionErrorCategory::Field,
                    error_type: "read_only_field".to_string(),
                    message: format!("Field '{}' is read-only", action.field),
                    details: Some(format!(
                        "'{}' is derived by the system and cannot be assigned",
                        action.field
                    )),
                    position: None,
                    context: Some(action.field.clone()),
                    suggestion: None,
                });
            }
        }
    }

    fn unknown_field_error(&self, field: &str) -> ExpressionValidationError {
        let best = self
            .valid_fields
            .iter()
            .filter_map(|candidate| {
                let score = similarity(field, candidate);
                (score >= SUGGESTION_THRESHOLD).then_some((candidate, score))
            })
            .max_by_key(|(_, score)| *score)
            .map(|(candidate, _)| candidate.clone());

        let details = match &best {
            Some(candidate) => Some(format!(
                "Field '{field}' is not available. Did you mean '{candidate}'?"
            )),
            None => Some(format!(
                "Field '{field}' is not available for this expression type"
            )),
        };

        let available: Vec<&str> = self.valid_fields.iter().map(|s| s.as_str()).collect();
        ExpressionValidationError {
            category: ExpressionErrorCategory::Field,
            error_type: "unknown_field".to_string(),
            message: format!("Unknown field '{field}'"),
            details,
            position: None,
            context: Some(field.to_string()),
            suggestion: best.or_else(|| Some(format!("Available fields: {}", available.join(", ")))),
        }
    }
}

/// Convenience entry point: validate `raw` against the union of
/// `domains`.
pub fn validate_expression(domains: &[ExpressionDomain], raw: &str) -> ExpressionValidateResult {
    ExpressionValidator::for_domains(domains).validate(raw)
}

/// Character-set overlap similarity: shared characters scaled by the
/// longer name's length. Identical strings score 100.
fn similarity(a: &str, b: &str) -> u32 {
    if a == b {
        return 100;
    }
    let a_low = a.to_lowercase();
    let b_low = b.to_lowercase();
    let a_chars: BTreeSet<char> = a_low.chars().collect();
    let b_chars: BTreeSet<char> = b_low.chars().collect();
    let common = a_chars.intersection(&b_chars).count();
    let max_len = a_low.chars().count().max(b_low.chars().count()).max(1);
    (common * 100 / max_len) as u32
}

/// Pre-scan the canonical text for structural problems the parser would
/// only report one at a time: unbalanced parentheses and unclosed
/// quotes. Quoted literals are skipped, escapes included.
fn scan_structural_errors(text: &str) -> Vec<ExpressionValidationError> {
    let mut errors = Vec::new();
    let mut open_parens: Vec<usize> = Vec::new();
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' | b'\'' => {
                let quote = bytes[i];
                let opening = i;
                i += 1;
                let mut closed = false;
                while i < bytes.len() {
                    if bytes[i] == b'\\' && i + 1 < bytes.len() {
                        i += 2;
                        continue;
                    }
                    if bytes[i] == quote {
                        closed = true;
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                if !closed {
                    errors.push(ExpressionValidationError {
                        category: ExpressionErrorCategory::Syntax,
                        error_type: "unclosed_quote".to_string(),
                        message: format!(
                            "Unclosed {} quote",
                            if quote == b'"' { "double" } else { "single" }
                        ),
                        details: Some(format!(
                            "String literal starting at position {opening} is not closed"
                        )),
                        position: Some(opening),
                        context: context_window(text, opening),
                        suggestion: Some(format!(
                            "Add a closing {} quote",
                            if quote == b'"' { '"' } else { '\'' }
                        )),
                    });
                }
            }
            b'(' => {
                open_parens.push(i);
                i += 1;
            }
            b')' => {
                if open_parens.pop().is_none() {
                    errors.push(ExpressionValidationError {
                        category: ExpressionErrorCategory::Syntax,
                        error_type: "unmatched_closing_parenthesis".to_string(),
                        message: "Unmatched closing parenthesis".to_string(),
                        details: Some(format!(
                            "Closing parenthesis at position {i} has no matching opening parenthesis"
                        )),
                        position: Some(i),
                        context: context_window(text, i),
                        suggestion: Some(
                            "Add an opening parenthesis or remove this one".to_string(),
                        ),
                    });
                }
                i += 1;
            }
            _ => i += 1,
        }
    }

    for opening in open_parens {
        errors.push(ExpressionValidationError {
            category: ExpressionErrorCategory::Syntax,
            error_type: "unclosed_parenthesis".to_string(),
            message: "Unclosed parenthesis".to_string(),
            details: Some(format!(
                "Opening parenthesis at position {opening} is never closed"
            )),
            position: Some(opening),
            context: context_window(text, opening),
            suggestion: Some("Add a closing parenthesis".to_string()),
        });
    }

    errors
}

fn syntax_error(canonical: &str, error: &ExpressionError) -> ExpressionValidationError {
    let (message, position, line, column) = match error {
        ExpressionError::Lex(e) => (e.message.clone(), e.position, e.line, e.column),
        ExpressionError::Parse(e) => (e.message.clone(), e.position, e.line, e.column),
        // parse_extended only produces lex and parse errors.
        other => (other.to_string(), 0, 1, 1),
    };

    let (error_type, category) = classify_syntax_error(error, &message);
    let suggestion = if error_type == "unknown_operator" {
        suggest_operator(&message)
    } else {
        None
    };
    ExpressionValidationError {
        category,
        error_type: error_type.to_string(),
        message,
        details: Some(format!("At line {line}, column {column}")),
        position: Some(position),
        context: context_window(canonical, position),
        suggestion,
    }
}

fn classify_syntax_error(
    error: &ExpressionError,
    message: &str,
) -> (&'static str, ExpressionErrorCategory) {
    if let ExpressionError::Lex(_) = error {
        return if message.contains("unterminated string") {
            ("unclosed_quote", ExpressionErrorCategory::Syntax)
        } else {
            ("unexpected_character", ExpressionErrorCategory::Syntax)
        };
    }
    if message.contains("Unknown operator") {
        ("unknown_operator", ExpressionErrorCategory::Operator)
    } else if message.contains("parenthes") {
        ("unbalanced_parenthesis", ExpressionErrorCategory::Syntax)
    } else {
        ("parse_error", ExpressionErrorCategory::Syntax)
    }
}

const OPERATOR_NAMES: &[&str] = &[
    "equals",
    "contains",
    "starts_with",
    "ends_with",
    "matches",
    "greater_than",
    "greater_than_or_equal",
    "less_than",
    "less_than_or_equal",
];

/// For an unknown-operator message, suggest the closest canonical
/// operator name ("Use 'contains' instead").
fn suggest_operator(message: &str) -> Option<String> {
    // The parser quotes the offending word first in the message.
    let start = message.find('\'')? + 1;
    let end = start + message[start..].find('\'')?;
    let word = &message[start..end];

    OPERATOR_NAMES
        .iter()
        .filter_map(|candidate| {
            let score = similarity(word, candidate);
            (score >= SUGGESTION_THRESHOLD).then_some((candidate, score))
        })
        .max_by_key(|(_, score)| *score)
        .map(|(candidate, _)| format!("Use '{candidate}' instead"))
}

/// A ±window slice of the expression text around a byte position,
/// clamped to character boundaries.
fn context_window(text: &str, position: usize) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let position = position.min(text.len());
    let mut start = position.saturating_sub(CONTEXT_WINDOW);
    while start > 0 && !text.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (position + CONTEXT_WINDOW).min(text.len());
    while end < text.len() && !text.is_char_boundary(end) {
        end += 1;
    }
    Some(text[start..end].to_string())
}

fn check_regex_patterns(parsed: &ParsedExpression, errors: &mut Vec<ExpressionValidationError>) {
    fn walk(node: &ConditionNode, errors: &mut Vec<ExpressionValidationError>) {
        match node {
            ConditionNode::Condition {
                operator, value, ..
            } if operator.is_regex() => {
                if let Err(e) = regex::Regex::new(value) {
                    errors.push(ExpressionValidationError {
                        category: ExpressionErrorCategory::Value,
                        error_type: "invalid_regex".to_string(),
                        message: "Invalid regular expression".to_string(),
                        details: Some(format!("Pattern '{value}' is invalid: {e}")),
                        position: None,
                        context: Some(format!("matches \"{value}\"")),
                        suggestion: None,
                    });
                }
            }
            ConditionNode::Condition { .. } => {}
            ConditionNode::Group { children, .. } => {
                for child in children {
                    walk(child, errors);
                }
            }
        }
    }

    if let Some(root) = &parsed.condition_tree().root {
        walk(root, errors);
    }
}

/// Serialize the AST into the stable display shape:
/// `{type, condition?, actions?}` with condition nodes
/// `{type: "condition", field, operator, value, case_sensitive}` and
/// `{type: "group", operator, children}`.
fn serialize_tree(expression: &ExtendedExpression) -> serde_json::Value {
    fn node_to_json(node: &ConditionNode) -> serde_json::Value {
        match node {
            ConditionNode::Condition {
                field,
                operator,
                value,
                case_sensitive,
            } => json!({
                "type": "condition",
                "field": field,
                "operator": operator.as_str(),
                "value": value,
                "case_sensitive": case_sensitive,
            }),
            ConditionNode::Group { operator, children } => json!({
                "type": "group",
                "operator": operator.to_string(),
                "children": children.iter().map(node_to_json).collect::<Vec<_>>(),
            }),
        }
    }

    fn actions_to_json(actions: &[Action]) -> serde_json::Value {
        serde_json::Value::Array(
            actions
                .iter()
                .map(|action| {
                    json!({
                        "field": action.field,
                        "operator": action.operator.as_str(),
                        "value": action.value.as_ref().and_then(|v| v.display_text()),
                    })
                })
                .collect(),
        )
    }

    match expression {
        ExtendedExpression::ConditionOnly(tree) => match &tree.root {
            Some(root) => json!({
                "type": "condition_only",
                "condition": node_to_json(root),
            }),
            None => json!({ "type": "condition_only" }),
        },
        ExtendedExpression::ConditionWithActions { condition, actions } => {
            let mut value = json!({
                "type": "condition_with_actions",
                "actions": actions_to_json(actions),
            });
            if let Some(root) = &condition.root {
                value["condition"] = node_to_json(root);
            }
            value
        }
    }
}
