//! Rule processor
//!
//! Applies a parsed expression to a modifiable record: evaluates the
//! condition, and on a match applies the actions in declaration order.
//! Action values resolve captures (`$N`), field references
//! (`$field_name`), dynamic references (`@dynamic(path):key` and legacy
//! `@prefix:param`) and immediate helpers (`@time:…`) before the write.
//!
//! Errors from evaluation or value resolution halt the rule; writes
//! already applied are not reverted, and callers treat the errored rule
//! as a failure without rollback.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::errors::ExpressionError;
use crate::expression::dynamic::DynamicFieldRegistry;
use crate::expression::evaluator::{Evaluator, FieldValueAccessor};
use crate::field_registry::FieldRegistry;
use crate::helpers::HelperRegistry;
use crate::models::{
    ActionOperator, ActionValue, FieldModification, ParsedExpression, RuleResult,
};

/// A record plus the ability to write field values. Canonical-name
/// resolution of reads is the implementer's concern; the processor
/// resolves action targets through the field registry's aliases before
/// calling `set_field_value`.
pub trait ModifiableContext: FieldValueAccessor {
    fn set_field_value(&mut self, field: &str, value: &str);
}

impl ModifiableContext for HashMap<String, String> {
    fn set_field_value(&mut self, field: &str, value: &str) {
        self.insert(field.to_string(), value.to_string());
    }
}

static CAPTURE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\d+)").expect("capture reference pattern is valid"));

/// Applies parsed rules to records.
pub struct RuleProcessor<'a> {
    evaluator: &'a Evaluator,
    helpers: &'a HelperRegistry,
    dynamic: Option<&'a DynamicFieldRegistry>,
}

impl<'a> RuleProcessor<'a> {
    pub fn new(evaluator: &'a Evaluator, helpers: &'a HelperRegistry) -> Self {
        Self {
            evaluator,
            helpers,
            dynamic: None,
        }
    }

    /// Attach a dynamic field registry for `@dynamic(...)` and legacy
    /// prefixed references.
    pub fn with_dynamic_registry(mut self, dynamic: &'a DynamicFieldRegistry) -> Self {
        self.dynamic = Some(dynamic);
        self
    }

    /// Evaluate the expression against the record and, on a match, apply
    /// its actions in order.
    pub fn process<C: ModifiableContext>(
        &self,
        parsed: &ParsedExpression,
        ctx: &mut C,
    ) -> Result<RuleResult, ExpressionError> {
        let evaluation = self.evaluator.evaluate(parsed.condition_tree(), &*ctx)?;

        if !evaluation.matched || !parsed.has_actions {
            return Ok(RuleResult {
                matched: evaluation.matched,
                modifications: Vec::new(),
                captures: evaluation.captures,
            });
        }

        let registry = FieldRegistry::global();
        let mut modifications = Vec::new();

        for action in parsed.actions() {
            let field = registry.resolve(&action.field).to_string();
            let old_value = ctx.field_value(&field).unwrap_or_default();

            let new_value = match action.operator {
                ActionOperator::Set => {
                    self.resolve_value(action.value.as_ref(), ctx, &evaluation.captures)?
                }
                ActionOperator::SetIfEmpty => {
                    if !old_value.is_empty() {
                        // No write, no modification entry.
                        continue;
                    }
                    self.resolve_value(action.value.as_ref(), ctx, &evaluation.captures)?
                }
                ActionOperator::Append => {
                    let resolved =
                        self.resolve_value(action.value.as_ref(), ctx, &evaluation.captures)?;
                    format!("{old_value}{resolved}")
                }
                ActionOperator::Remove => {
                    let resolved =
                        self.resolve_value(action.value.as_ref(), ctx, &evaluation.captures)?;
                    if resolved.is_empty() {
                        old_value.clone()
                    } else {
                        old_value.replace(&resolved, "")
                    }
                }
                ActionOperator::Delete => String::new(),
            };

            ctx.set_field_value(&field, &new_value);
            debug!(
                "applied {} to '{}': '{}' -> '{}'",
                action.operator, field, old_value, new_value
            );
            modifications.push(FieldModification {
                field,
                old_value,
                new_value,
                operator: action.operator,
            });
        }

        Ok(RuleResult {
            matched: true,
            modifications,
            captures: evaluation.captures,
        })
    }

    fn resolve_value<C: ModifiableContext>(
        &self,
        value: Option<&ActionValue>,
        ctx: &C,
        captures: &[String],
    ) -> Result<String, ExpressionError> {
        let Some(value) = value else {
            return Ok(String::new());
        };

        match value {
            ActionValue::Null => Ok(String::new()),
            ActionValue::Literal(text) => {
                // Legacy `@prefix:param` dynamic references stay literal
                // through the parser; a registered prefix resolves here.
                if let Some(resolved) = self.resolve_legacy_dynamic(text) {
                    return Ok(resolved);
                }
                let substituted = substitute_captures(text, captures);
                let resolved = self.helpers.process_immediate(&substituted)?;
                Ok(resolved)
            }
            ActionValue::FieldRef(field) => {
                let canonical = FieldRegistry::global().resolve(field);
                Ok(ctx.field_value(canonical).unwrap_or_default())
            }
            ActionValue::CaptureRef(index) => {
                Ok(captures.get(*index).cloned().unwrap_or_default())
            }
            ActionValue::DynamicRef(reference) => Ok(self
                .dynamic
                .and_then(|registry| registry.resolve_ref(reference))
                .unwrap_or_default()),
        }
    }

    fn resolve_legacy_dynamic(&self, text: &str) -> Option<String> {
        let registry = self.dynamic?;
        let (prefix, parameter) = text.strip_prefix('@')?.split_once(':')?;
        if !registry.has_prefix(prefix) {
            return None;
        }
        Some(registry.resolve_legacy(prefix, parameter).unwrap_or_default())
    }
}

/// Substitute every `$N` in a literal with the Nth capture when the index
/// is in range; out-of-range references stay literal.
fn substitute_captures(input: &str, captures: &[String]) -> String {
    if captures.is_empty() || !input.contains('$') {
        return input.to_string();
    }
    CAPTURE_REF
        .replace_all(input, |m: &regex::Captures<'_>| {
            let index: usize = m[1].parse().unwrap_or(usize::MAX);
            match captures.get(index) {
                Some(captured) => captured.clone(),
                None => m[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::dynamic::DynamicFieldResolver;
    use crate::expression::parser::ExpressionParser;
    use std::sync::Arc;

    fn record(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn process(expression: &str, ctx: &mut HashMap<String, String>) -> RuleResult {
        let evaluator = Evaluator::new();
        let helpers = HelperRegistry::with_builtins();
        let parsed = ExpressionParser::new().parse_extended(expression).unwrap();
        RuleProcessor::new(&evaluator, &helpers)
            .process(&parsed, ctx)
            .unwrap()
    }

    #[test]
    fn condition_only_reports_match_without_modifications() {
        let mut rec = record(&[("channel_name", "BBC One")]);
        let result = process("channel_name contains \"BBC\"", &mut rec);
        assert!(result.matched);
        assert!(result.modifications.is_empty());
    }

    #[test]
    fn unmatched_rule_applies_nothing() {
        let mut rec = record(&[("channel_name", "ITV")]);
        let result = process("channel_name contains \"BBC\" SET group_title = \"UK\"", &mut rec);
        assert!(!result.matched);
        assert!(result.modifications.is_empty());
        assert_eq!(rec.field_value("group_title"), None);
    }

    #[test]
    fn regex_captures_substitute_into_set() {
        // Strip the HD suffix and regroup
        let mut rec = record(&[("channel_name", "BBC One HD"), ("group_title", "")]);
        let result = process(
            "channel_name matches \"(.+) HD$\" SET channel_name = \"$1\", group_title = \"HD Channels\"",
            &mut rec,
        );
        assert!(result.matched);
        assert_eq!(result.modifications.len(), 2);
        assert_eq!(result.modifications[0].field, "channel_name");
        assert_eq!(result.modifications[0].old_value, "BBC One HD");
        assert_eq!(result.modifications[0].new_value, "BBC One");
        assert_eq!(result.modifications[1].field, "group_title");
        assert_eq!(result.modifications[1].new_value, "HD Channels");
        assert_eq!(rec.field_value("channel_name").unwrap(), "BBC One");
    }

    #[test]
    fn out_of_range_capture_reference_stays_literal() {
        let mut rec = record(&[("channel_name", "BBC One HD")]);
        process(
            "channel_name matches \"(.+) HD$\" SET tvg_name = \"$1 $9\"",
            &mut rec,
        );
        assert_eq!(rec.field_value("tvg_name").unwrap(), "BBC One $9");
    }

    #[test]
    fn capture_reference_value_resolves_directly() {
        let mut rec = record(&[("channel_name", "UK: BBC One")]);
        process("channel_name matches \"UK: (.+)\" SET channel_name = $1", &mut rec);
        assert_eq!(rec.field_value("channel_name").unwrap(), "BBC One");
    }

    #[test]
    fn set_if_empty_is_a_noop_on_populated_fields() {
        let mut rec = record(&[("channel_name", "BBC One"), ("tvg_logo", "existing.png")]);
        let result = process(
            "channel_name contains \"BBC\" SET_IF_EMPTY tvg_logo = \"bbc.png\"",
            &mut rec,
        );
        assert!(result.matched);
        assert!(result.modifications.is_empty());
        assert_eq!(rec.field_value("tvg_logo").unwrap(), "existing.png");
    }

    #[test]
    fn set_if_empty_fills_empty_fields() {
        let mut rec = record(&[("channel_name", "BBC One"), ("tvg_logo", "")]);
        let result = process(
            "channel_name contains \"BBC\" SET_IF_EMPTY tvg_logo = \"bbc.png\"",
            &mut rec,
        );
        assert_eq!(result.modifications.len(), 1);
        assert_eq!(rec.field_value("tvg_logo").unwrap(), "bbc.png");
    }

    #[test]
    fn append_remove_delete() {
        let mut rec = record(&[("channel_name", "BBC One [AD] HD")]);
        process("true APPEND channel_name = \" +1\"", &mut rec);
        assert_eq!(rec.field_value("channel_name").unwrap(), "BBC One [AD] HD +1");

        process("true REMOVE channel_name = \"[AD] \"", &mut rec);
        assert_eq!(rec.field_value("channel_name").unwrap(), "BBC One HD +1");

        let result = process("true DELETE channel_name", &mut rec);
        assert_eq!(rec.field_value("channel_name").unwrap(), "");
        assert_eq!(result.modifications[0].operator, ActionOperator::Delete);
        assert_eq!(result.modifications[0].old_value, "BBC One HD +1");
    }

    #[test]
    fn remove_strips_every_occurrence() {
        let mut rec = record(&[("channel_name", "a-b-c-d")]);
        process("true REMOVE channel_name = \"-\"", &mut rec);
        assert_eq!(rec.field_value("channel_name").unwrap(), "abcd");
    }

    #[test]
    fn field_reference_reads_current_record_value() {
        let mut rec = record(&[("channel_name", "BBC One"), ("tvg_name", "")]);
        process("channel_name not equals \"\" SET_IF_EMPTY tvg_name = $channel_name", &mut rec);
        assert_eq!(rec.field_value("tvg_name").unwrap(), "BBC One");
    }

    #[test]
    fn later_actions_observe_earlier_writes() {
        let mut rec = record(&[("channel_name", "BBC")]);
        let result = process(
            "true SET group_title = \"UK\" APPEND group_title = \" TV\"",
            &mut rec,
        );
        assert_eq!(rec.field_value("group_title").unwrap(), "UK TV");
        assert_eq!(result.modifications.len(), 2);
        assert_eq!(result.modifications[1].old_value, "UK");
    }

    #[test]
    fn action_targets_resolve_aliases() {
        let mut rec = record(&[("channel_name", "BBC")]);
        // "logo" is an alias of tvg_logo
        process("true SET logo = \"x.png\"", &mut rec);
        assert_eq!(rec.field_value("tvg_logo").unwrap(), "x.png");
        assert_eq!(rec.field_value("logo"), None);
    }

    #[test]
    fn time_helper_resolves_immediately_logo_defers() {
        let mut rec = record(&[]);
        process(
            "true SET start_time = \"@time:parse|2024-01-01 12:00:00\", tvg_logo = \"@logo:01ARZ3NDEKTSV4RRFFQ69G5FAV\"",
            &mut rec,
        );
        assert_eq!(rec.field_value("start_time").unwrap(), "2024-01-01T12:00:00Z");
        assert_eq!(
            rec.field_value("tvg_logo").unwrap(),
            "@logo:01ARZ3NDEKTSV4RRFFQ69G5FAV"
        );
    }

    #[test]
    fn helper_errors_halt_the_rule_keeping_prior_writes() {
        let evaluator = Evaluator::new();
        let helpers = HelperRegistry::with_builtins();
        let parsed = ExpressionParser::new()
            .parse_extended("true SET group_title = \"UK\", start_time = \"@time:parse|garbage\"")
            .unwrap();
        let mut rec = record(&[]);
        let err = RuleProcessor::new(&evaluator, &helpers)
            .process(&parsed, &mut rec)
            .expect_err("helper failure expected");
        assert!(matches!(err, ExpressionError::Helper(_)));
        // The first write stays applied
        assert_eq!(rec.field_value("group_title").unwrap(), "UK");
    }

    #[test]
    fn dynamic_header_reference_resolves() {
        let evaluator = Evaluator::new();
        let helpers = HelperRegistry::with_builtins();
        let mut dynamic = DynamicFieldRegistry::new();
        dynamic
            .context_mut()
            .set("request.headers.x-video-codec", "h265");

        let parsed = ExpressionParser::new()
            .parse_extended("true SET preferred_video_codec = @dynamic(request.headers):x-video-codec")
            .unwrap();
        let mut rec = record(&[]);
        RuleProcessor::new(&evaluator, &helpers)
            .with_dynamic_registry(&dynamic)
            .process(&parsed, &mut rec)
            .unwrap();
        assert_eq!(rec.field_value("preferred_video_codec").unwrap(), "h265");
    }

    #[test]
    fn missing_dynamic_reference_resolves_empty() {
        let evaluator = Evaluator::new();
        let helpers = HelperRegistry::with_builtins();
        let dynamic = DynamicFieldRegistry::new();

        let parsed = ExpressionParser::new()
            .parse_extended("true SET preferred_video_codec = @dynamic(request.headers):absent")
            .unwrap();
        let mut rec = record(&[]);
        RuleProcessor::new(&evaluator, &helpers)
            .with_dynamic_registry(&dynamic)
            .process(&parsed, &mut rec)
            .unwrap();
        assert_eq!(rec.field_value("preferred_video_codec").unwrap(), "");
    }

    struct SourceMetadata;

    impl DynamicFieldResolver for SourceMetadata {
        fn resolve(&self, parameter: &str) -> Option<String> {
            (parameter == "name").then(|| "provider-one".to_string())
        }
    }

    #[test]
    fn legacy_prefixed_reference_resolves_through_registry() {
        let evaluator = Evaluator::new();
        let helpers = HelperRegistry::with_builtins();
        let mut dynamic = DynamicFieldRegistry::new();
        dynamic.register_resolver("source", Arc::new(SourceMetadata));

        let parsed = ExpressionParser::new()
            .parse_extended("true SET group_title = @source:name")
            .unwrap();
        let mut rec = record(&[]);
        RuleProcessor::new(&evaluator, &helpers)
            .with_dynamic_registry(&dynamic)
            .process(&parsed, &mut rec)
            .unwrap();
        assert_eq!(rec.field_value("group_title").unwrap(), "provider-one");
    }

    #[test]
    fn set_records_modification_even_when_value_is_unchanged() {
        let mut rec = record(&[("group_title", "UK")]);
        let result = process("true SET group_title = \"UK\"", &mut rec);
        assert_eq!(result.modifications.len(), 1);
        assert_eq!(result.modifications[0].old_value, "UK");
        assert_eq!(result.modifications[0].new_value, "UK");
    }
}
