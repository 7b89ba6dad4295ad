//! Canonical text serialization
//!
//! Renders an AST back into the normalized surface form the preprocessor
//! produces: keyword operators, `not <operator>` for negations, quoted
//! values (bare for numeric comparisons against numbers), parentheses
//! only where precedence requires them, and keyword actions with
//! comma-merged runs of one operator.
//!
//! For an expression already in canonical form,
//! `canonical_text(parse(x)) == x` up to value quoting.

use crate::models::{
    Action, ActionValue, ConditionNode, ExtendedExpression, FilterOperator, LogicalOperator,
};

/// Render a full expression (conditions plus actions).
pub fn canonical_text(expression: &ExtendedExpression) -> String {
    let mut out = String::new();

    if let Some(root) = &expression.condition_tree().root {
        out.push_str(&render_node(root, None));
    }

    let actions = expression.actions();
    if !actions.is_empty() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&render_actions(actions));
    }

    out
}

fn render_node(node: &ConditionNode, parent: Option<LogicalOperator>) -> String {
    match node {
        ConditionNode::Condition {
            field,
            operator,
            value,
            case_sensitive,
        } => render_condition(field, *operator, value, *case_sensitive),
        ConditionNode::Group { operator, children } => {
            let connective = format!(" {operator} ");
            let body = children
                .iter()
                .map(|child| render_node(child, Some(*operator)))
                .collect::<Vec<_>>()
                .join(&connective);
            // Parentheses only when an OR group sits inside an AND group;
            // flattening guarantees same-operator nesting never occurs.
            match (parent, operator) {
                (Some(LogicalOperator::And), LogicalOperator::Or) => format!("({body})"),
                _ => body,
            }
        }
    }
}

fn render_condition(
    field: &str,
    operator: FilterOperator,
    value: &str,
    case_sensitive: bool,
) -> String {
    // The synthetic boolean-literal condition renders back to its
    // surface keyword.
    if field.is_empty() {
        return match operator {
            FilterOperator::Equals => "true".to_string(),
            _ => "false".to_string(),
        };
    }

    let mut out = String::new();
    out.push_str(field);
    if case_sensitive {
        out.push_str(" case_sensitive");
    }
    out.push(' ');
    out.push_str(&render_operator(operator));
    out.push(' ');
    out.push_str(&render_value(value, operator.is_numeric()));
    out
}

/// Negated string/regex operators render in the canonical modifier form;
/// numeric comparisons are their own complements and render directly.
fn render_operator(operator: FilterOperator) -> String {
    match operator {
        FilterOperator::NotEquals => "not equals".to_string(),
        FilterOperator::NotContains => "not contains".to_string(),
        FilterOperator::NotStartsWith => "not starts_with".to_string(),
        FilterOperator::NotEndsWith => "not ends_with".to_string(),
        FilterOperator::NotMatches => "not matches".to_string(),
        other => other.as_str().to_string(),
    }
}

fn render_value(value: &str, numeric_context: bool) -> String {
    if numeric_context && value.parse::<f64>().is_ok() {
        return value.to_string();
    }
    quote(value)
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Consecutive actions sharing one operator merge into a single keyword
/// clause: `SET a = "1", b = "2" DELETE c, d`.
fn render_actions(actions: &[Action]) -> String {
    let mut clauses: Vec<String> = Vec::new();
    let mut index = 0;

    while index < actions.len() {
        let operator = actions[index].operator;
        let mut assignments: Vec<String> = Vec::new();
        while index < actions.len() && actions[index].operator == operator {
            assignments.push(render_assignment(&actions[index]));
            index += 1;
        }
        clauses.push(format!("{} {}", operator.keyword(), assignments.join(", ")));
    }

    clauses.join(" ")
}

fn render_assignment(action: &Action) -> String {
    match &action.value {
        None => action.field.clone(),
        Some(value) => format!("{} = {}", action.field, render_action_value(value)),
    }
}

fn render_action_value(value: &ActionValue) -> String {
    match value {
        ActionValue::Literal(text) => quote(text),
        ActionValue::Null => quote(""),
        ActionValue::FieldRef(field) => format!("${field}"),
        ActionValue::CaptureRef(index) => format!("${index}"),
        ActionValue::DynamicRef(reference) => reference.raw.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::parser::ExpressionParser;
    use crate::expression::preprocessor::preprocess_expression;
    use rstest::rstest;

    fn round_trip(canonical: &str) -> String {
        let parsed = ExpressionParser::new().parse_extended(canonical).unwrap();
        canonical_text(&parsed.expression)
    }

    #[rstest]
    #[case("channel_name contains \"BBC\"")]
    #[case("channel_name not equals \"Test\"")]
    #[case("channel_name case_sensitive contains \"BBC\"")]
    #[case("tvg_chno greater_than 10")]
    #[case("a equals \"1\" AND b equals \"2\" AND c equals \"3\"")]
    #[case("(a equals \"1\" OR b equals \"2\") AND c equals \"3\"")]
    #[case("a equals \"1\" OR b equals \"2\" AND c equals \"3\"")]
    #[case("channel_name matches \"(.+) HD$\" SET channel_name = \"$1\", group_title = \"HD\"")]
    #[case("true SET group_title = \"All\"")]
    #[case("false")]
    #[case("true DELETE tvg_logo, tvg_shift")]
    #[case("true SET a = \"1\", b = \"2\" SET_IF_EMPTY c = \"3\"")]
    #[case("true SET codec = @dynamic(request.headers):x-video-codec")]
    #[case("true SET tvg_name = $channel_name APPEND tvg_name = \" HD\"")]
    fn canonical_forms_round_trip_exactly(#[case] canonical: &str) {
        assert_eq!(round_trip(canonical), canonical);
    }

    #[test]
    fn serialized_text_matches_preprocessed_original() {
        // Serialize(AST) equals Preprocess(original) for quoted-value
        // expressions in keyword form
        let original = "channel_name == \"BBC\" && group_title != \"\" SET tvg_name = \"x\"";
        let canonical = preprocess_expression(original);
        assert_eq!(round_trip(&canonical), canonical);
    }

    #[test]
    fn serialized_text_reparses_to_equal_ast() {
        let inputs = [
            "a equals \"1\" OR b equals \"2\" AND c equals \"3\"",
            "channel_name not matches \"^Test\" SET group_title = \"Kept\"",
            "(a equals \"1\" OR b equals \"2\") AND c not equals \"3\"",
        ];
        let parser = ExpressionParser::new();
        for input in inputs {
            let first = parser.parse_extended(input).unwrap();
            let rendered = canonical_text(&first.expression);
            let second = parser.parse_extended(&rendered).unwrap();
            assert_eq!(first.expression, second.expression, "input: {input}");
        }
    }

    #[test]
    fn values_with_escapes_stay_parseable() {
        let parsed = ExpressionParser::new()
            .parse_extended("channel_name contains \"say \\\"hi\\\"\\n\"")
            .unwrap();
        let rendered = canonical_text(&parsed.expression);
        let reparsed = ExpressionParser::new().parse_extended(&rendered).unwrap();
        assert_eq!(parsed.expression, reparsed.expression);
    }

    #[test]
    fn or_inside_and_gets_parentheses_and_inside_or_does_not() {
        let parser = ExpressionParser::new();

        let or_in_and = parser
            .parse_extended("(a equals \"1\" OR b equals \"2\") AND c equals \"3\"")
            .unwrap();
        assert_eq!(
            canonical_text(&or_in_and.expression),
            "(a equals \"1\" OR b equals \"2\") AND c equals \"3\""
        );

        let and_in_or = parser
            .parse_extended("a equals \"1\" OR b equals \"2\" AND c equals \"3\"")
            .unwrap();
        assert_eq!(
            canonical_text(&and_in_or.expression),
            "a equals \"1\" OR b equals \"2\" AND c equals \"3\""
        );
    }
}
