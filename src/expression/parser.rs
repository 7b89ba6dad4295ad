//! Expression parser
//!
//! Recursive descent over the lexer's token stream, producing a
//! `ParsedExpression`. Precedence low→high: `OR`, `AND`, `NOT`,
//! parentheses. Consecutive operations with the same logical operator are
//! accumulated into one N-ary group at parse time rather than a
//! right-leaning chain; this keeps evaluation and serialization simple.
//!
//! `NOT` is lowered onto the condition operator (`NOT a equals "x"`
//! becomes `a not_equals "x"`), so the AST has no negation node. `NOT`
//! over a parenthesized group is a parse error.

use tracing::trace;

use crate::errors::{ExpressionError, LexError, ParseError};
use crate::expression::dynamic::parse_dynamic_ref;
use crate::expression::lexer::{self, Token, TokenKind};
use crate::models::{
    Action, ActionOperator, ActionValue, ConditionNode, ConditionTree, ExtendedExpression,
    FilterOperator, LogicalOperator, ParsedExpression,
};

/// Parser for the normalized expression surface. Expects preprocessed
/// text (see `expression::preprocessor`); raw symbolic input will simply
/// fail on the unexpected tokens.
#[derive(Debug, Clone, Default)]
pub struct ExpressionParser;

impl ExpressionParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a full expression: a condition tree optionally followed by
    /// actions. Empty input yields a condition-only expression with a
    /// null tree (matches everything). Tokenization failures come back
    /// as `ExpressionError::Lex`, grammar mismatches as
    /// `ExpressionError::Parse`.
    pub fn parse_extended(&self, expression: &str) -> Result<ParsedExpression, ExpressionError> {
        trace!("parsing expression (length: {} chars)", expression.len());

        let tokens = lexer::tokenize(expression);
        if let Some(error) = tokens.iter().find(|t| t.is_error()) {
            return Err(ExpressionError::Lex(LexError {
                message: error.value.clone(),
                position: error.position,
                line: error.line,
                column: error.column,
            }));
        }

        let mut state = ParserState { tokens: &tokens, pos: 0 };

        let condition = if state.current().kind == TokenKind::Eof {
            ConditionTree::empty()
        } else {
            ConditionTree {
                root: Some(state.parse_or()?),
            }
        };

        let actions = state.parse_actions()?;

        let token = state.current();
        if token.kind != TokenKind::Eof {
            return Err(state
                .error_at(token, format!("Unexpected token '{}'", token.value))
                .into());
        }

        let expression_node = if actions.is_empty() {
            ExtendedExpression::ConditionOnly(condition)
        } else {
            ExtendedExpression::ConditionWithActions { condition, actions }
        };

        Ok(build_parsed_expression(expression.to_string(), expression_node))
    }
}

struct ParserState<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> ParserState<'a> {
    fn current(&self) -> &'a Token {
        // The token stream always ends with Eof, so indexing is safe.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &'a Token {
        &self.tokens[(self.pos + 1).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> &'a Token {
        let token = self.current();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, token: &Token, message: String) -> ParseError {
        ParseError::new(message, token.position, token.line, token.column)
    }

    // ---- conditions -------------------------------------------------

    fn parse_or(&mut self) -> Result<ConditionNode, ParseError> {
        let first = self.parse_and()?;
        if self.current().kind != TokenKind::Or {
            return Ok(first);
        }

        let mut children = Vec::new();
        push_flattened(&mut children, first, LogicalOperator::Or);
        while self.current().kind == TokenKind::Or {
            self.advance();
            let next = self.parse_and()?;
            push_flattened(&mut children, next, LogicalOperator::Or);
        }
        Ok(ConditionNode::Group {
            operator: LogicalOperator::Or,
            children,
        })
    }

    fn parse_and(&mut self) -> Result<ConditionNode, ParseError> {
        let first = self.parse_unary()?;
        if self.current().kind != TokenKind::And {
            return Ok(first);
        }

        let mut children = Vec::new();
        push_flattened(&mut children, first, LogicalOperator::And);
        while self.current().kind == TokenKind::And {
            self.advance();
            let next = self.parse_unary()?;
            push_flattened(&mut children, next, LogicalOperator::And);
        }
        Ok(ConditionNode::Group {
            operator: LogicalOperator::And,
            children,
        })
    }

    fn parse_unary(&mut self) -> Result<ConditionNode, ParseError> {
        if self.current().kind != TokenKind::Not {
            return self.parse_primary();
        }

        self.advance();
        let token = self.current();
        if token.kind == TokenKind::LeftParen {
            return Err(self.error_at(
                token,
                "NOT cannot be applied to a parenthesized group; negate the individual conditions"
                    .to_string(),
            ));
        }

        match self.parse_primary()? {
            ConditionNode::Condition {
                field,
                operator,
                value,
                case_sensitive,
            } => Ok(ConditionNode::Condition {
                field,
                operator: operator.negate(),
                value,
                case_sensitive,
            }),
            ConditionNode::Group { .. } => {
                // parse_primary only returns a group for parentheses,
                // which are rejected above.
                unreachable!("NOT over a group is rejected before parsing")
            }
        }
    }

    fn parse_primary(&mut self) -> Result<ConditionNode, ParseError> {
        let token = self.current();
        match token.kind {
            TokenKind::LeftParen => {
                self.advance();
                let node = self.parse_or()?;
                let closing = self.current();
                if closing.kind != TokenKind::RightParen {
                    return Err(self.error_at(
                        closing,
                        format!("Missing closing parenthesis, found '{}'", closing.value),
                    ));
                }
                self.advance();
                Ok(node)
            }
            TokenKind::Identifier => self.parse_simple_condition(),
            _ => Err(self.error_at(
                token,
                format!(
                    "Expected field name, NOT, or opening parenthesis, found '{}'",
                    token.value
                ),
            )),
        }
    }

    /// `field [not|case_sensitive]* operator value`, or a bare boolean
    /// literal acting as constant truth.
    fn parse_simple_condition(&mut self) -> Result<ConditionNode, ParseError> {
        let field_token = self.advance();
        let field = field_token.value.clone();

        // `true` / `false` as a whole condition: constant truth expressed
        // as equality against a synthetic field that is never set.
        if matches!(field.as_str(), "true" | "TRUE" | "false" | "FALSE")
            && !matches!(self.current().kind, TokenKind::Identifier | TokenKind::Not)
        {
            let matches_everything = field.eq_ignore_ascii_case("true");
            return Ok(ConditionNode::Condition {
                field: String::new(),
                operator: if matches_everything {
                    FilterOperator::Equals
                } else {
                    FilterOperator::NotEquals
                },
                value: String::new(),
                case_sensitive: false,
            });
        }

        let mut negate = false;
        let mut case_sensitive = false;
        loop {
            let token = self.current();
            match token.kind {
                TokenKind::Not => {
                    if negate {
                        return Err(self.error_at(token, "Duplicate 'not' modifier".to_string()));
                    }
                    negate = true;
                    self.advance();
                }
                TokenKind::Identifier if token.value == "case_sensitive" => {
                    if case_sensitive {
                        return Err(
                            self.error_at(token, "Duplicate 'case_sensitive' modifier".to_string())
                        );
                    }
                    case_sensitive = true;
                    self.advance();
                }
                _ => break,
            }
        }

        let op_token = self.current();
        if op_token.kind != TokenKind::Identifier {
            return Err(self.error_at(
                op_token,
                format!(
                    "Expected operator after field '{field}', found '{}'",
                    op_token.value
                ),
            ));
        }
        let Some(base_operator) = FilterOperator::parse(&op_token.value) else {
            return Err(self.error_at(
                op_token,
                format!("Unknown operator '{}' after field '{field}'", op_token.value),
            ));
        };
        self.advance();

        let operator = if negate {
            base_operator.negate()
        } else {
            base_operator
        };

        let value_token = self.current();
        let value = match value_token.kind {
            TokenKind::String | TokenKind::Number | TokenKind::Identifier => {
                value_token.value.clone()
            }
            _ => {
                return Err(self.error_at(
                    value_token,
                    format!("Expected value after operator, found '{}'", value_token.value),
                ));
            }
        };
        self.advance();

        Ok(ConditionNode::Condition {
            field,
            operator,
            value,
            case_sensitive,
        })
    }

    // ---- actions ----------------------------------------------------

    fn parse_actions(&mut self) -> Result<Vec<Action>, ParseError> {
        let mut actions = Vec::new();

        loop {
            let token = self.current();
            match token.kind {
                TokenKind::Set => {
                    let keyword = self.advance();
                    let operator = ActionOperator::parse_keyword(&keyword.value)
                        .expect("Set tokens always carry a valid keyword");
                    self.parse_keyword_assignments(operator, &mut actions)?;
                }
                TokenKind::Identifier if actions_follow(self.peek().kind) => {
                    actions.push(self.parse_shorthand_action()?);
                }
                _ => break,
            }
        }

        Ok(actions)
    }

    /// Comma-separated assignments sharing one keyword operator:
    /// `SET a = "1", b = "2"` / `DELETE a, b`.
    fn parse_keyword_assignments(
        &mut self,
        operator: ActionOperator,
        actions: &mut Vec<Action>,
    ) -> Result<(), ParseError> {
        loop {
            let field_token = self.current();
            if field_token.kind != TokenKind::Identifier {
                return Err(self.error_at(
                    field_token,
                    format!(
                        "Expected field name after action keyword, found '{}'",
                        field_token.value
                    ),
                ));
            }
            let field = field_token.value.clone();
            self.advance();

            let value = if operator.requires_value() {
                let eq_token = self.current();
                if eq_token.kind != TokenKind::Equals {
                    return Err(self.error_at(
                        eq_token,
                        format!("Expected '=' after field '{field}', found '{}'", eq_token.value),
                    ));
                }
                self.advance();
                Some(self.parse_action_value()?)
            } else {
                None
            };

            actions.push(Action {
                field,
                operator,
                value,
            });

            if self.current().kind == TokenKind::Comma {
                self.advance();
                continue;
            }
            return Ok(());
        }
    }

    /// `field = value`, `field ?= value`, `field += value`, `field -= value`.
    fn parse_shorthand_action(&mut self) -> Result<Action, ParseError> {
        let field_token = self.advance();
        let field = field_token.value.clone();

        let op_token = self.advance();
        let operator = match op_token.kind {
            TokenKind::Equals => ActionOperator::Set,
            TokenKind::SetIfEmptyAssign => ActionOperator::SetIfEmpty,
            TokenKind::AppendAssign => ActionOperator::Append,
            TokenKind::RemoveAssign => ActionOperator::Remove,
            _ => {
                return Err(self.error_at(
                    op_token,
                    format!(
                        "Expected assignment operator after field '{field}', found '{}'",
                        op_token.value
                    ),
                ));
            }
        };

        let value = self.parse_action_value()?;
        Ok(Action {
            field,
            operator,
            value: Some(value),
        })
    }

    fn parse_action_value(&mut self) -> Result<ActionValue, ParseError> {
        let token = self.current();
        let value = match token.kind {
            TokenKind::String | TokenKind::Number => ActionValue::Literal(token.value.clone()),
            TokenKind::Identifier => {
                let text = &token.value;
                if text.starts_with("@dynamic(") {
                    match parse_dynamic_ref(text) {
                        Some(reference) => ActionValue::DynamicRef(reference),
                        None => {
                            return Err(self.error_at(
                                token,
                                format!("Malformed dynamic reference '{text}'"),
                            ));
                        }
                    }
                } else if let Some(rest) = text.strip_prefix('$') {
                    if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                        // Indexes larger than any capture list resolve to
                        // empty at application time.
                        let index = rest.parse().map_err(|_| {
                            self.error_at(token, format!("Capture index '{text}' out of range"))
                        })?;
                        ActionValue::CaptureRef(index)
                    } else if rest.is_empty() {
                        ActionValue::Literal(text.clone())
                    } else {
                        ActionValue::FieldRef(rest.to_string())
                    }
                } else {
                    ActionValue::Literal(text.clone())
                }
            }
            _ => {
                return Err(self.error_at(
                    token,
                    format!("Expected value after assignment operator, found '{}'", token.value),
                ));
            }
        };
        self.advance();
        Ok(value)
    }
}

/// True when an identifier at action position begins a shorthand action.
fn actions_follow(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Equals
            | TokenKind::SetIfEmptyAssign
            | TokenKind::AppendAssign
            | TokenKind::RemoveAssign
    )
}

/// Splice same-operator child groups while accumulating, so chains and
/// redundantly parenthesized runs of one operator land in a single N-ary
/// group.
fn push_flattened(children: &mut Vec<ConditionNode>, node: ConditionNode, operator: LogicalOperator) {
    match node {
        ConditionNode::Group {
            operator: child_op,
            children: sub,
        } if child_op == operator => children.extend(sub),
        other => children.push(other),
    }
}

/// Derive the parse-time metadata: referenced fields (unique, insertion
/// order), regex usage, action presence and modified fields.
fn build_parsed_expression(original_text: String, expression: ExtendedExpression) -> ParsedExpression {
    let mut referenced_fields: Vec<String> = Vec::new();
    let mut uses_regex = false;

    fn walk(node: &ConditionNode, referenced: &mut Vec<String>, uses_regex: &mut bool) {
        match node {
            ConditionNode::Condition { field, operator, .. } => {
                // The synthetic boolean-literal condition has no field.
                if !field.is_empty() && !referenced.iter().any(|f| f == field) {
                    referenced.push(field.clone());
                }
                if operator.is_regex() {
                    *uses_regex = true;
                }
            }
            ConditionNode::Group { children, .. } => {
                for child in children {
                    walk(child, referenced, uses_regex);
                }
            }
        }
    }

    if let Some(root) = &expression.condition_tree().root {
        walk(root, &mut referenced_fields, &mut uses_regex);
    }

    let actions = expression.actions();
    let has_actions = !actions.is_empty();
    let modified_fields = actions.iter().map(|a| a.field.clone()).collect();

    ParsedExpression {
        original_text,
        expression,
        has_actions,
        uses_regex,
        referenced_fields,
        modified_fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(expression: &str) -> ParsedExpression {
        ExpressionParser::new()
            .parse_extended(expression)
            .unwrap_or_else(|e| panic!("'{expression}' should parse: {e}"))
    }

    fn parse_err(expression: &str) -> ExpressionError {
        ExpressionParser::new()
            .parse_extended(expression)
            .expect_err("expected parse failure")
    }

    fn parse_syntax_err(expression: &str) -> ParseError {
        match parse_err(expression) {
            ExpressionError::Parse(error) => error,
            other => panic!("expected a parse error, got {other:?}"),
        }
    }

    #[test]
    fn simple_condition() {
        let parsed = parse("channel_name contains \"sport\"");
        match &parsed.condition_tree().root {
            Some(ConditionNode::Condition {
                field,
                operator,
                value,
                case_sensitive,
            }) => {
                assert_eq!(field, "channel_name");
                assert_eq!(*operator, FilterOperator::Contains);
                assert_eq!(value, "sport");
                assert!(!case_sensitive);
            }
            other => panic!("Expected condition node, got {other:?}"),
        }
        assert!(!parsed.has_actions);
        assert_eq!(parsed.referenced_fields, vec!["channel_name"]);
    }

    #[test]
    fn empty_expression_matches_everything() {
        let parsed = parse("");
        assert!(parsed.condition_tree().is_empty());
        assert!(!parsed.has_actions);
        assert!(parsed.referenced_fields.is_empty());
    }

    #[test]
    fn mid_field_modifiers_lower_onto_operator() {
        let parsed = parse("channel_name not case_sensitive contains \"BBC\"");
        match &parsed.condition_tree().root {
            Some(ConditionNode::Condition {
                operator,
                case_sensitive,
                ..
            }) => {
                assert_eq!(*operator, FilterOperator::NotContains);
                assert!(case_sensitive);
            }
            other => panic!("Expected condition node, got {other:?}"),
        }
    }

    #[test]
    fn not_before_simple_condition_negates_operator() {
        let parsed = parse("NOT channel_name equals \"Test\"");
        match &parsed.condition_tree().root {
            Some(ConditionNode::Condition { operator, .. }) => {
                assert_eq!(*operator, FilterOperator::NotEquals);
            }
            other => panic!("Expected condition node, got {other:?}"),
        }
    }

    #[test]
    fn double_negation_restores_operator() {
        let parsed = parse("NOT channel_name not equals \"Test\"");
        match &parsed.condition_tree().root {
            Some(ConditionNode::Condition { operator, .. }) => {
                assert_eq!(*operator, FilterOperator::Equals);
            }
            other => panic!("Expected condition node, got {other:?}"),
        }
    }

    #[test]
    fn not_before_group_is_an_error() {
        let err = parse_syntax_err("NOT (channel_name equals \"x\")");
        assert!(err.message.contains("parenthesized"), "{}", err.message);
        assert_eq!(err.position, 4);
    }

    #[test]
    fn and_chain_flattens_to_single_group() {
        let parsed = parse("a equals \"1\" AND b equals \"2\" AND c equals \"3\"");
        match &parsed.condition_tree().root {
            Some(ConditionNode::Group { operator, children }) => {
                assert_eq!(*operator, LogicalOperator::And);
                assert_eq!(children.len(), 3);
                assert!(children
                    .iter()
                    .all(|c| matches!(c, ConditionNode::Condition { .. })));
            }
            other => panic!("Expected AND group, got {other:?}"),
        }
    }

    #[test]
    fn parenthesized_same_operator_runs_also_flatten() {
        let parsed = parse("(a equals \"1\" AND b equals \"2\") AND c equals \"3\"");
        match &parsed.condition_tree().root {
            Some(ConditionNode::Group { operator, children }) => {
                assert_eq!(*operator, LogicalOperator::And);
                assert_eq!(children.len(), 3);
            }
            other => panic!("Expected AND group, got {other:?}"),
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // a OR (b AND c), never (a OR b) AND c
        let parsed = parse("a equals \"1\" OR b equals \"2\" AND c equals \"3\"");
        match &parsed.condition_tree().root {
            Some(ConditionNode::Group { operator, children }) => {
                assert_eq!(*operator, LogicalOperator::Or);
                assert_eq!(children.len(), 2);
                match &children[1] {
                    ConditionNode::Group { operator, children } => {
                        assert_eq!(*operator, LogicalOperator::And);
                        assert_eq!(children.len(), 2);
                    }
                    other => panic!("Expected nested AND group, got {other:?}"),
                }
            }
            other => panic!("Expected OR group, got {other:?}"),
        }
    }

    #[test]
    fn parentheses_override_precedence() {
        let parsed = parse("(a equals \"1\" OR b equals \"2\") AND c equals \"3\"");
        match &parsed.condition_tree().root {
            Some(ConditionNode::Group { operator, children }) => {
                assert_eq!(*operator, LogicalOperator::And);
                match &children[0] {
                    ConditionNode::Group { operator, .. } => {
                        assert_eq!(*operator, LogicalOperator::Or)
                    }
                    other => panic!("Expected nested OR group, got {other:?}"),
                }
            }
            other => panic!("Expected AND group, got {other:?}"),
        }
    }

    #[test]
    fn unquoted_values_accepted_for_compatibility() {
        let parsed = parse("group_title equals UK");
        match &parsed.condition_tree().root {
            Some(ConditionNode::Condition { value, .. }) => assert_eq!(value, "UK"),
            other => panic!("Expected condition, got {other:?}"),
        }
    }

    #[test]
    fn boolean_literal_true_is_a_catch_all() {
        let parsed = parse("true SET group_title = \"All\"");
        match &parsed.condition_tree().root {
            Some(ConditionNode::Condition {
                field,
                operator,
                value,
                ..
            }) => {
                assert_eq!(field, "");
                assert_eq!(*operator, FilterOperator::Equals);
                assert_eq!(value, "");
            }
            other => panic!("Expected synthetic condition, got {other:?}"),
        }
        assert!(parsed.has_actions);
        assert!(parsed.referenced_fields.is_empty());
    }

    #[test]
    fn boolean_literal_false_matches_nothing() {
        let parsed = parse("FALSE");
        match &parsed.condition_tree().root {
            Some(ConditionNode::Condition { operator, .. }) => {
                assert_eq!(*operator, FilterOperator::NotEquals);
            }
            other => panic!("Expected synthetic condition, got {other:?}"),
        }
    }

    #[test]
    fn keyword_action_with_comma_list() {
        let parsed = parse("channel_name contains \"sport\" SET group_title = \"Sports\", tvg_name = \"sports\"");
        let actions = parsed.actions();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].field, "group_title");
        assert_eq!(actions[0].operator, ActionOperator::Set);
        assert_eq!(
            actions[0].value,
            Some(ActionValue::Literal("Sports".to_string()))
        );
        assert_eq!(actions[1].field, "tvg_name");
        assert_eq!(actions[1].operator, ActionOperator::Set);
        assert_eq!(parsed.modified_fields, vec!["group_title", "tvg_name"]);
    }

    #[test]
    fn every_action_keyword_is_recognized() {
        let parsed = parse(
            "true SET a = \"1\" SET_IF_EMPTY b = \"2\" APPEND c = \"3\" REMOVE d = \"4\" DELETE e",
        );
        let operators: Vec<ActionOperator> = parsed.actions().iter().map(|a| a.operator).collect();
        assert_eq!(
            operators,
            vec![
                ActionOperator::Set,
                ActionOperator::SetIfEmpty,
                ActionOperator::Append,
                ActionOperator::Remove,
                ActionOperator::Delete,
            ]
        );
        assert_eq!(parsed.actions()[4].value, None);
    }

    #[test]
    fn delete_takes_a_bare_field_list() {
        let parsed = parse("true DELETE tvg_logo, tvg_shift");
        let actions = parsed.actions();
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| a.operator == ActionOperator::Delete));
        assert!(actions.iter().all(|a| a.value.is_none()));
    }

    #[test]
    fn shorthand_actions_map_to_operators() {
        let parsed = parse("true SET a = \"1\" b ?= \"2\" c += \"3\" d -= \"4\"");
        let operators: Vec<ActionOperator> = parsed.actions().iter().map(|a| a.operator).collect();
        assert_eq!(
            operators,
            vec![
                ActionOperator::Set,
                ActionOperator::SetIfEmpty,
                ActionOperator::Append,
                ActionOperator::Remove,
            ]
        );
    }

    #[test]
    fn keyword_and_shorthand_actions_interleave() {
        let parsed =
            parse("true SET a = \"1\", b = \"2\" c ?= \"3\" SET_IF_EMPTY d = \"4\" e += \"5\"");
        let fields: Vec<&str> = parsed.actions().iter().map(|a| a.field.as_str()).collect();
        assert_eq!(fields, vec!["a", "b", "c", "d", "e"]);
        let operators: Vec<ActionOperator> = parsed.actions().iter().map(|a| a.operator).collect();
        assert_eq!(
            operators,
            vec![
                ActionOperator::Set,
                ActionOperator::Set,
                ActionOperator::SetIfEmpty,
                ActionOperator::SetIfEmpty,
                ActionOperator::Append,
            ]
        );
    }

    #[test]
    fn action_value_variants() {
        let parsed = parse(
            "true SET a = \"lit $1\", b = $channel_name, c = $2, d = @dynamic(request.headers):x-device, e = @time:now, f = 42",
        );
        let actions = parsed.actions();
        assert_eq!(
            actions[0].value,
            Some(ActionValue::Literal("lit $1".to_string()))
        );
        assert_eq!(
            actions[1].value,
            Some(ActionValue::FieldRef("channel_name".to_string()))
        );
        assert_eq!(actions[2].value, Some(ActionValue::CaptureRef(2)));
        match &actions[3].value {
            Some(ActionValue::DynamicRef(r)) => {
                assert_eq!(r.path, "request.headers");
                assert_eq!(r.key, "x-device");
            }
            other => panic!("Expected dynamic reference, got {other:?}"),
        }
        assert_eq!(
            actions[4].value,
            Some(ActionValue::Literal("@time:now".to_string()))
        );
        assert_eq!(actions[5].value, Some(ActionValue::Literal("42".to_string())));
    }

    #[test]
    fn metadata_tracks_regex_and_fields() {
        let parsed = parse(
            "channel_name matches \"(.+) HD$\" AND group_title equals \"UK\" SET tvg_name = \"$1\"",
        );
        assert!(parsed.uses_regex);
        assert!(parsed.has_actions);
        assert_eq!(parsed.referenced_fields, vec!["channel_name", "group_title"]);
        assert_eq!(parsed.modified_fields, vec!["tvg_name"]);
    }

    #[test]
    fn referenced_fields_are_unique_in_insertion_order() {
        let parsed = parse("b equals \"1\" OR a equals \"2\" OR b equals \"3\"");
        assert_eq!(parsed.referenced_fields, vec!["b", "a"]);
    }

    #[test]
    fn syntax_errors() {
        // Missing value after keyword assignment
        parse_err("channel_name contains \"sport\" SET group_title =");
        // Missing '=' in keyword action
        parse_err("channel_name contains \"sport\" SET group_title \"Sports\"");
        // Missing action after SET
        parse_err("channel_name contains \"sport\" SET");
        // Missing operator
        parse_err("channel_name \"sport\"");
        // Missing value
        parse_err("channel_name contains");
        // Unbalanced parenthesis
        parse_err("(a equals \"1\" AND b equals \"2\"");
        // Dangling logical operator
        parse_err("a equals \"1\" AND");
        // Duplicate modifier
        parse_err("a not not equals \"1\"");
        // Comma outside a keyword action list
        parse_err("true SET a = \"1\" b ?= \"2\", c = \"3\"");
    }

    #[test]
    fn parse_errors_carry_positions() {
        let err = parse_syntax_err("channel_name frobs \"x\"");
        assert_eq!(err.position, 13);
        assert_eq!(err.line, 1);
        assert_eq!(err.column, 14);
        assert!(err.message.contains("frobs"));
    }

    #[test]
    fn unterminated_string_is_a_lex_error() {
        match parse_err("channel_name contains \"oops") {
            ExpressionError::Lex(error) => {
                assert!(error.message.contains("unterminated"));
                assert_eq!(error.position, 22);
                assert_eq!(error.column, 23);
            }
            other => panic!("expected a lex error, got {other:?}"),
        }
    }

    #[test]
    fn unexpected_character_is_a_lex_error() {
        assert!(matches!(
            parse_err("channel_name ~ \"x\""),
            ExpressionError::Lex(_)
        ));
    }

    #[test]
    fn canonical_text_reparses_to_equal_ast() {
        let expressions = [
            "channel_name contains \"BBC\" AND group_title equals \"UK\"",
            "(a equals \"1\" OR b equals \"2\") AND c not equals \"3\"",
            "channel_name matches \"(.+) HD$\" SET channel_name = \"$1\", group_title = \"HD\"",
        ];
        let parser = ExpressionParser::new();
        for expression in expressions {
            let first = parser.parse_extended(expression).unwrap();
            let second = parser.parse_extended(expression).unwrap();
            assert_eq!(first.expression, second.expression);
        }
    }
}
