//! Filter engine
//!
//! Ordered include/exclude predicates over records. Filters are
//! condition-only expressions; an `is_inverse` filter excludes the
//! records it matches instead of including them.
//!
//! Decision semantics, first decisive filter wins:
//! - a matching normal filter includes the record
//! - a matching inverse filter excludes the record
//! - when nothing matched, the record is included only if the list has
//!   no normal (include) filters — a pure-exclusion list keeps
//!   everything it did not match, while an include list drops whatever
//!   no filter claimed

use thiserror::Error;
use tracing::debug;

use crate::errors::ExpressionError;
use crate::expression::evaluator::{Evaluator, EvaluatorConfig, FieldValueAccessor};
use crate::models::ParsedExpression;

#[derive(Error, Debug)]
pub enum FilterError {
    /// Filters are predicates; rewrite rules belong to the mapping engine.
    #[error("Filter '{name}' contains actions; filters must be condition-only")]
    HasActions { name: String },
}

/// One registered filter.
pub struct FilterRule {
    pub name: String,
    pub is_inverse: bool,
    pub expression: ParsedExpression,
}

/// Configuration for the filter engine.
#[derive(Debug, Clone, Default)]
pub struct FilterEngineConfig {
    pub evaluator: EvaluatorConfig,
}

/// Outcome of filtering one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDecision {
    pub include: bool,
    /// Name of the filter that decided, when one matched.
    pub matched_filter: Option<String>,
}

/// Ordered filter list applied record by record.
pub struct FilterEngine {
    evaluator: Evaluator,
    filters: Vec<FilterRule>,
    has_include_filters: bool,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::with_config(FilterEngineConfig::default())
    }

    pub fn with_config(config: FilterEngineConfig) -> Self {
        Self {
            evaluator: Evaluator::with_config(config.evaluator),
            filters: Vec::new(),
            has_include_filters: false,
        }
    }

    pub fn add_filter(
        &mut self,
        name: &str,
        is_inverse: bool,
        expression: ParsedExpression,
    ) -> Result<(), FilterError> {
        if expression.has_actions {
            return Err(FilterError::HasActions {
                name: name.to_string(),
            });
        }
        self.has_include_filters |= !is_inverse;
        self.filters.push(FilterRule {
            name: name.to_string(),
            is_inverse,
            expression,
        });
        Ok(())
    }

    pub fn filters(&self) -> &[FilterRule] {
        &self.filters
    }

    /// Decide whether to keep one record.
    pub fn process(
        &self,
        record: &dyn FieldValueAccessor,
    ) -> Result<FilterDecision, ExpressionError> {
        for filter in &self.filters {
            let result = self
                .evaluator
                .evaluate(filter.expression.condition_tree(), record)?;
            if result.matched {
                debug!(
                    "filter '{}' matched ({})",
                    filter.name,
                    if filter.is_inverse { "exclude" } else { "include" }
                );
                return Ok(FilterDecision {
                    include: !filter.is_inverse,
                    matched_filter: Some(filter.name.clone()),
                });
            }
        }

        Ok(FilterDecision {
            include: !self.has_include_filters,
            matched_filter: None,
        })
    }
}

impl Default for FilterEngine {
    fn default() -> Self {
        Self::new()
    }
}
