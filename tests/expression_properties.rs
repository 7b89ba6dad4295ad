//! Property tests for the algebraic guarantees of the expression
//! pipeline: operator negation is an involution, preprocessing is
//! idempotent, and canonical text reparses to a structurally equal AST.

use proptest::prelude::*;

use stream_mapper::expression::parser::ExpressionParser;
use stream_mapper::expression::preprocessor::preprocess_expression;
use stream_mapper::models::{ConditionNode, FilterOperator, LogicalOperator};

const OPERATORS: &[FilterOperator] = &[
    FilterOperator::Equals,
    FilterOperator::NotEquals,
    FilterOperator::Contains,
    FilterOperator::NotContains,
    FilterOperator::StartsWith,
    FilterOperator::NotStartsWith,
    FilterOperator::EndsWith,
    FilterOperator::NotEndsWith,
    FilterOperator::Matches,
    FilterOperator::NotMatches,
    FilterOperator::GreaterThan,
    FilterOperator::GreaterThanOrEqual,
    FilterOperator::LessThan,
    FilterOperator::LessThanOrEqual,
];

fn field_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("channel_name".to_string()),
        Just("group_title".to_string()),
        Just("tvg_id".to_string()),
        Just("tvg_name".to_string()),
        Just("stream_url".to_string()),
    ]
}

fn string_operator() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("equals"),
        Just("contains"),
        Just("starts_with"),
        Just("ends_with"),
        Just("not equals"),
        Just("not contains"),
    ]
}

/// Values restricted to characters that survive quoting untouched.
fn quoted_value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _.:+-]{0,12}"
}

fn condition() -> impl Strategy<Value = String> {
    (field_name(), string_operator(), quoted_value())
        .prop_map(|(field, op, value)| format!("{field} {op} \"{value}\""))
}

/// Canonical-form expressions: conditions joined by AND/OR.
fn expression() -> impl Strategy<Value = String> {
    (
        condition(),
        prop::collection::vec((prop_oneof![Just("AND"), Just("OR")], condition()), 0..4),
    )
        .prop_map(|(first, rest)| {
            let mut text = first;
            for (connective, cond) in rest {
                text.push(' ');
                text.push_str(connective);
                text.push(' ');
                text.push_str(&cond);
            }
            text
        })
}

/// Surface-variant expressions using symbolic operators.
fn symbolic_expression() -> impl Strategy<Value = String> {
    (
        field_name(),
        prop_oneof![Just("=="), Just("!="), Just("=~"), Just("!~")],
        quoted_value(),
        field_name(),
        prop_oneof![Just("&&"), Just("||"), Just("and"), Just("or")],
        quoted_value(),
    )
        .prop_map(|(f1, op, v1, f2, conn, v2)| {
            format!("{f1} {op} \"{v1}\" {conn} {f2} == \"{v2}\"")
        })
}

proptest! {
    #[test]
    fn negation_is_an_involution(index in 0usize..14) {
        let op = OPERATORS[index];
        prop_assert_eq!(op.negate().negate(), op);
        prop_assert_ne!(op.negate(), op);
    }

    #[test]
    fn preprocess_is_idempotent_on_canonical_text(expr in expression()) {
        let once = preprocess_expression(&expr);
        let twice = preprocess_expression(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn preprocess_is_idempotent_after_symbolic_rewrite(expr in symbolic_expression()) {
        let once = preprocess_expression(&expr);
        let twice = preprocess_expression(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn canonical_text_reparses_structurally_equal(expr in expression()) {
        let parser = ExpressionParser::new();
        let canonical = preprocess_expression(&expr);
        let first = parser.parse_extended(&canonical).unwrap();
        let second = parser.parse_extended(&canonical).unwrap();
        prop_assert_eq!(first.expression, second.expression);
    }

    #[test]
    fn symbolic_surface_parses_after_preprocessing(expr in symbolic_expression()) {
        let parser = ExpressionParser::new();
        let canonical = preprocess_expression(&expr);
        parser.parse_extended(&canonical).unwrap();
    }

    #[test]
    fn single_operator_chains_flatten_to_one_group(
        conditions in prop::collection::vec(condition(), 2..5),
        use_and in any::<bool>(),
    ) {
        let connective = if use_and { " AND " } else { " OR " };
        let expected = if use_and { LogicalOperator::And } else { LogicalOperator::Or };
        let text = conditions.join(connective);

        let parsed = ExpressionParser::new().parse_extended(&text).unwrap();
        match &parsed.condition_tree().root {
            Some(ConditionNode::Group { operator, children }) => {
                prop_assert_eq!(*operator, expected);
                prop_assert_eq!(children.len(), conditions.len());
                for child in children {
                    let is_condition = matches!(child, ConditionNode::Condition { .. });
                    prop_assert!(is_condition);
                }
            }
            other => prop_assert!(false, "expected a flattened group, got {other:?}"),
        }
    }
}
