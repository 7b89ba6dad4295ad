//! Condition tree evaluator
//!
//! Walks a `ConditionTree` against a `FieldValueAccessor`. Evaluation is
//! strictly left-to-right with short-circuiting; regex captures propagate
//! outward so the rule processor can substitute `$N` references.
//!
//! Compiled regexes are cached per evaluator instance in a map keyed by
//! the exact (possibly `(?i)`-prefixed) pattern string behind a
//! read-write lock, so one evaluator is safe to share across worker
//! threads.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use regex::Regex;

use crate::errors::EvalError;
use crate::models::{ConditionNode, ConditionTree, EvaluationResult, FilterOperator, LogicalOperator};

/// Read access to a record's fields. Missing fields may return `None`;
/// the evaluator treats absent as the empty string, so conditions over
/// unknown fields never error (unless an operator forces numeric
/// parsing).
pub trait FieldValueAccessor {
    fn field_value(&self, field: &str) -> Option<String>;
}

impl FieldValueAccessor for HashMap<String, String> {
    fn field_value(&self, field: &str) -> Option<String> {
        self.get(field).cloned()
    }
}

/// Evaluator configuration.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
    /// Applied when a condition does not carry its own `case_sensitive`
    /// flag. The per-condition flag can only force sensitivity on.
    pub case_sensitive_default: bool,
    /// Bound on the compiled-pattern cache; the cache is cleared when the
    /// bound is reached.
    pub max_regex_cache_size: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            case_sensitive_default: true,
            max_regex_cache_size: 1000,
        }
    }
}

/// Tree-walking evaluator with a shared compiled-regex cache.
pub struct Evaluator {
    config: EvaluatorConfig,
    regex_cache: RwLock<HashMap<String, Arc<Regex>>>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_config(EvaluatorConfig::default())
    }

    pub fn with_config(config: EvaluatorConfig) -> Self {
        Self {
            config,
            regex_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Evaluate a condition tree. An empty tree matches everything.
    pub fn evaluate(
        &self,
        tree: &ConditionTree,
        accessor: &dyn FieldValueAccessor,
    ) -> Result<EvaluationResult, EvalError> {
        match &tree.root {
            None => Ok(EvaluationResult::matched(Vec::new())),
            Some(root) => self.evaluate_node(root, accessor),
        }
    }

    fn evaluate_node(
        &self,
        node: &ConditionNode,
        accessor: &dyn FieldValueAccessor,
    ) -> Result<EvaluationResult, EvalError> {
        match node {
            ConditionNode::Group { operator, children } => {
                self.evaluate_group(*operator, children, accessor)
            }
            ConditionNode::Condition {
                field,
                operator,
                value,
                case_sensitive,
            } => self.evaluate_condition(field, *operator, value, *case_sensitive, accessor),
        }
    }

    fn evaluate_group(
        &self,
        operator: LogicalOperator,
        children: &[ConditionNode],
        accessor: &dyn FieldValueAccessor,
    ) -> Result<EvaluationResult, EvalError> {
        // An empty group matches.
        if children.is_empty() {
            return Ok(EvaluationResult::matched(Vec::new()));
        }

        match operator {
            LogicalOperator::And => {
                // Short-circuit on the first false; the last non-empty
                // capture list from matching children wins.
                let mut captures = Vec::new();
                for child in children {
                    let result = self.evaluate_node(child, accessor)?;
                    if !result.matched {
                        return Ok(EvaluationResult::unmatched());
                    }
                    if !result.captures.is_empty() {
                        captures = result.captures;
                    }
                }
                Ok(EvaluationResult::matched(captures))
            }
            LogicalOperator::Or => {
                // Short-circuit on the first true; its captures are the
                // group's captures.
                for child in children {
                    let result = self.evaluate_node(child, accessor)?;
                    if result.matched {
                        return Ok(result);
                    }
                }
                Ok(EvaluationResult::unmatched())
            }
        }
    }

    fn evaluate_condition(
        &self,
        field: &str,
        operator: FilterOperator,
        value: &str,
        case_sensitive: bool,
        accessor: &dyn FieldValueAccessor,
    ) -> Result<EvaluationResult, EvalError> {
        let field_value = accessor.field_value(field).unwrap_or_default();
        let sensitive = case_sensitive || self.config.case_sensitive_default;

        if operator.is_regex() {
            return self.evaluate_regex(&field_value, operator, value, sensitive);
        }

        if operator.is_numeric() {
            return Self::evaluate_numeric(field, &field_value, operator, value);
        }

        let (lhs, rhs) = if sensitive {
            (field_value.clone(), value.to_string())
        } else {
            (field_value.to_lowercase(), value.to_lowercase())
        };

        let matched = match operator {
            FilterOperator::Equals => lhs == rhs,
            FilterOperator::NotEquals => lhs != rhs,
            FilterOperator::Contains => lhs.contains(&rhs),
            FilterOperator::NotContains => !lhs.contains(&rhs),
            FilterOperator::StartsWith => lhs.starts_with(&rhs),
            FilterOperator::NotStartsWith => !lhs.starts_with(&rhs),
            FilterOperator::EndsWith => lhs.ends_with(&rhs),
            FilterOperator::NotEndsWith => !lhs.ends_with(&rhs),
            // Regex and numeric operators are handled above.
            _ => unreachable!("operator class already dispatched"),
        };

        Ok(if matched {
            EvaluationResult::matched(Vec::new())
        } else {
            EvaluationResult::unmatched()
        })
    }

    fn evaluate_regex(
        &self,
        field_value: &str,
        operator: FilterOperator,
        pattern: &str,
        sensitive: bool,
    ) -> Result<EvaluationResult, EvalError> {
        let effective_pattern = if sensitive {
            pattern.to_string()
        } else {
            format!("(?i){pattern}")
        };
        let regex = self.cached_regex(&effective_pattern)?;

        match operator {
            FilterOperator::Matches => match regex.captures(field_value) {
                Some(captured) => {
                    // Full submatch array: index 0 is the whole match,
                    // non-participating groups read as empty.
                    let captures = (0..captured.len())
                        .map(|i| {
                            captured
                                .get(i)
                                .map(|m| m.as_str().to_string())
                                .unwrap_or_default()
                        })
                        .collect();
                    Ok(EvaluationResult::matched(captures))
                }
                None => Ok(EvaluationResult::unmatched()),
            },
            FilterOperator::NotMatches => {
                if regex.is_match(field_value) {
                    Ok(EvaluationResult::unmatched())
                } else {
                    Ok(EvaluationResult::matched(Vec::new()))
                }
            }
            _ => unreachable!("only regex operators reach here"),
        }
    }

    fn evaluate_numeric(
        field: &str,
        field_value: &str,
        operator: FilterOperator,
        value: &str,
    ) -> Result<EvaluationResult, EvalError> {
        let lhs: f64 = field_value
            .trim()
            .parse()
            .map_err(|_| EvalError::NonNumericOperand {
                field: field.to_string(),
                value: field_value.to_string(),
            })?;
        let rhs: f64 = value.trim().parse().map_err(|_| EvalError::NonNumericOperand {
            field: field.to_string(),
            value: value.to_string(),
        })?;

        let matched = match operator {
            FilterOperator::GreaterThan => lhs > rhs,
            FilterOperator::GreaterThanOrEqual => lhs >= rhs,
            FilterOperator::LessThan => lhs < rhs,
            FilterOperator::LessThanOrEqual => lhs <= rhs,
            _ => unreachable!("only numeric operators reach here"),
        };

        Ok(if matched {
            EvaluationResult::matched(Vec::new())
        } else {
            EvaluationResult::unmatched()
        })
    }

    /// Fetch or compile a regex. Readers share the lock; a miss upgrades
    /// to the write side, clearing the cache first when the bound is hit.
    fn cached_regex(&self, pattern: &str) -> Result<Arc<Regex>, EvalError> {
        {
            let cache = self.regex_cache.read().expect("regex cache poisoned");
            if let Some(regex) = cache.get(pattern) {
                return Ok(Arc::clone(regex));
            }
        }

        let compiled = Regex::new(pattern).map_err(|source| EvalError::InvalidRegex {
            pattern: pattern.to_string(),
            source,
        })?;
        let regex = Arc::new(compiled);

        let mut cache = self.regex_cache.write().expect("regex cache poisoned");
        if cache.len() >= self.config.max_regex_cache_size {
            cache.clear();
        }
        cache.insert(pattern.to_string(), Arc::clone(&regex));
        Ok(regex)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}
