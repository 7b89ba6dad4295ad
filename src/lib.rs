//! stream-mapper
//!
//! Expression engine for a streaming-media aggregation service. A small
//! domain-specific language drives three subsystems:
//!
//! 1. **Filtering** — boolean predicates over record fields (keep or drop
//!    channels and programmes)
//! 2. **Data mapping** — conditional, ordered rewrite rules that mutate
//!    record fields
//! 3. **Client detection** — predicates over HTTP request context that
//!    select response behaviour
//!
//! The pipeline is `raw text → preprocessing → lexing → parsing → AST →
//! evaluation / rule application`, supported by the field, helper and
//! dynamic-context registries.

pub mod data_mapping;
pub mod errors;
pub mod expression;
pub mod field_registry;
pub mod filtering;
pub mod helpers;
pub mod models;
pub mod utils;
pub mod web;

pub use data_mapping::{DataMappingEngine, DataMappingEngineConfig};
pub use errors::{EvalError, ExpressionError, HelperError, LexError, ParseError};
pub use expression::evaluator::{Evaluator, EvaluatorConfig, FieldValueAccessor};
pub use expression::parser::ExpressionParser;
pub use expression::preprocessor::preprocess_expression;
pub use expression::rule_processor::{ModifiableContext, RuleProcessor};
pub use expression::serializer::canonical_text;
pub use expression::validator::{validate_expression, ExpressionValidator};
pub use expression::{parse_expression_extended, ExpressionDomain};
pub use field_registry::{FieldDomain, FieldRegistry, FieldType};
pub use filtering::{FilterDecision, FilterEngine, FilterEngineConfig};
pub use helpers::HelperRegistry;
pub use models::{
    Action, ActionOperator, ActionValue, Channel, ConditionNode, ConditionTree, EpgChannel,
    EpgProgram, EvaluationResult, ExpressionValidateResult, ExtendedExpression, FieldModification,
    FilterOperator, LogicalOperator, MappingResult, ParsedExpression, RuleResult,
};
pub use web::{ClientDetection, ClientDetector, RequestContext};
