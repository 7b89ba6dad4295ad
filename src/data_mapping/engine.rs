//! Data mapping engine
//!
//! Holds an ordered list of parsed rules and applies them to one record
//! at a time. Rules apply in registration order; later rules observe the
//! writes of earlier matched rules. A pass stops early when
//! stop-on-first-match is set and a rule matched, and aborts on the first
//! unrecoverable error.

use std::time::Instant;

use tracing::{debug, info};

use crate::errors::ExpressionError;
use crate::expression::dynamic::DynamicFieldRegistry;
use crate::expression::evaluator::{Evaluator, EvaluatorConfig};
use crate::expression::rule_processor::{ModifiableContext, RuleProcessor};
use crate::helpers::HelperRegistry;
use crate::models::{MappingResult, ParsedExpression, RuleResult};

/// Configuration for the data mapping engine.
#[derive(Debug, Clone, Default)]
pub struct DataMappingEngineConfig {
    /// Stop the pass after the first rule whose condition matched.
    pub stop_on_first_match: bool,
    /// Log per-pass timing at info level.
    pub enable_performance_logging: bool,
    pub evaluator: EvaluatorConfig,
}

/// One registered rule: a display name for logging plus its parsed
/// expression.
pub struct MappingRule {
    pub name: String,
    pub expression: ParsedExpression,
}

/// Engine applying ordered transformation rules to records.
pub struct DataMappingEngine {
    config: DataMappingEngineConfig,
    evaluator: Evaluator,
    helpers: HelperRegistry,
    rules: Vec<MappingRule>,
}

impl DataMappingEngine {
    pub fn new() -> Self {
        Self::with_config(DataMappingEngineConfig::default())
    }

    pub fn with_config(config: DataMappingEngineConfig) -> Self {
        let evaluator = Evaluator::with_config(config.evaluator.clone());
        Self {
            config,
            evaluator,
            helpers: HelperRegistry::with_builtins(),
            rules: Vec::new(),
        }
    }

    /// Replace the helper registry (e.g. to install a resolving logo
    /// helper). Must happen before the engine is shared.
    pub fn set_helpers(&mut self, helpers: HelperRegistry) {
        self.helpers = helpers;
    }

    pub fn add_rule(&mut self, name: &str, expression: ParsedExpression) {
        self.rules.push(MappingRule {
            name: name.to_string(),
            expression,
        });
    }

    pub fn rules(&self) -> &[MappingRule] {
        &self.rules
    }

    /// Apply every rule to the record in order.
    pub fn process<C: ModifiableContext>(
        &self,
        ctx: &mut C,
    ) -> Result<MappingResult, ExpressionError> {
        self.run(ctx, None)
    }

    /// Apply every rule with a dynamic field registry attached, so rule
    /// values can reference request headers, query parameters and source
    /// metadata.
    pub fn process_with_dynamic<C: ModifiableContext>(
        &self,
        ctx: &mut C,
        dynamic: &DynamicFieldRegistry,
    ) -> Result<MappingResult, ExpressionError> {
        self.run(ctx, Some(dynamic))
    }

    /// Apply a single expression outside the registered rule list. Used
    /// by rule testing endpoints and tests.
    pub fn test_expression<C: ModifiableContext>(
        &self,
        expression: &ParsedExpression,
        ctx: &mut C,
    ) -> Result<RuleResult, ExpressionError> {
        RuleProcessor::new(&self.evaluator, &self.helpers).process(expression, ctx)
    }

    fn run<C: ModifiableContext>(
        &self,
        ctx: &mut C,
        dynamic: Option<&DynamicFieldRegistry>,
    ) -> Result<MappingResult, ExpressionError> {
        let start = Instant::now();
        let mut result = MappingResult::default();

        for rule in &self.rules {
            let mut processor = RuleProcessor::new(&self.evaluator, &self.helpers);
            if let Some(registry) = dynamic {
                processor = processor.with_dynamic_registry(registry);
            }

            let rule_result = processor.process(&rule.expression, ctx)?;
            if rule_result.matched {
                result.rules_matched += 1;
                debug!(
                    "rule '{}' matched with {} modification(s)",
                    rule.name,
                    rule_result.modifications.len()
                );
            }
            result.total_modifications += rule_result.modifications.len();
            result.modifications.extend(rule_result.modifications);

            if self.config.stop_on_first_match && rule_result.matched {
                break;
            }
        }

        if self.config.enable_performance_logging {
            info!(
                "mapping pass over {} rule(s) took {:?}: {} matched, {} modification(s)",
                self.rules.len(),
                start.elapsed(),
                result.rules_matched,
                result.total_modifications
            );
        }

        Ok(result)
    }
}

impl Default for DataMappingEngine {
    fn default() -> Self {
        Self::new()
    }
}
