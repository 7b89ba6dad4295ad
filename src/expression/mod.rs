//! Expression system
//!
//! The full pipeline lives under this module:
//! `raw text → preprocessor → lexer → parser → AST → evaluator / rule
//! processor`, plus the dynamic context and the structured validator.
//!
//! `parse_expression_extended` is the usual entry point for stored
//! expressions: it selects the field set for a domain, preprocesses,
//! parses and checks field legality in one call.

pub mod dynamic;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod preprocessor;
pub mod rule_processor;
pub mod serializer;
pub mod validator;

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::field_registry::{FieldDomain, FieldRegistry};
use crate::models::ParsedExpression;

/// Logical domain in which an expression is authored / evaluated.
///
/// This lets us:
/// * Select the correct record side (stream vs EPG)
/// * Select the correct stage (filter predicate vs mapping rule)
/// * Derive the canonical field set (and aliases) from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionDomain {
    StreamFilter,
    EpgFilter,
    StreamMapping,
    EpgMapping,
}

impl ExpressionDomain {
    /// The field-registry domains a field must be a member of to be legal
    /// in this expression domain.
    pub fn field_domains(self) -> [FieldDomain; 2] {
        match self {
            ExpressionDomain::StreamFilter => [FieldDomain::Stream, FieldDomain::Filter],
            ExpressionDomain::EpgFilter => [FieldDomain::Epg, FieldDomain::Filter],
            ExpressionDomain::StreamMapping => [FieldDomain::Stream, FieldDomain::Rule],
            ExpressionDomain::EpgMapping => [FieldDomain::Epg, FieldDomain::Rule],
        }
    }

    /// Canonical field names plus their aliases, valid in this domain.
    pub fn valid_field_names(self) -> BTreeSet<String> {
        let registry = FieldRegistry::global();
        let definitions = registry.definitions_for(&self.field_domains());

        let mut names: BTreeSet<String> =
            definitions.iter().map(|d| d.name.to_string()).collect();
        for definition in definitions {
            for alias in definition.aliases {
                names.insert((*alias).to_string());
            }
        }
        names
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExpressionDomain::StreamFilter => "stream_filter",
            ExpressionDomain::EpgFilter => "epg_filter",
            ExpressionDomain::StreamMapping => "stream_mapping",
            ExpressionDomain::EpgMapping => "epg_mapping",
        }
    }
}

impl std::fmt::Display for ExpressionDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpressionDomain {
    type Err = anyhow::Error;

    /// Accepts the canonical names plus the legacy rule/data-mapping
    /// spellings still present in stored configurations.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "stream_filter" => ExpressionDomain::StreamFilter,
            "epg_filter" => ExpressionDomain::EpgFilter,
            "stream_mapping" | "stream_data_mapping" | "stream_rule" => {
                ExpressionDomain::StreamMapping
            }
            "epg_mapping" | "epg_data_mapping" | "epg_rule" => ExpressionDomain::EpgMapping,
            other => anyhow::bail!("Unknown expression domain '{other}'"),
        })
    }
}

/// Preprocess, parse and domain-validate a stored expression.
///
/// Returns `Ok(None)` when the (trimmed) expression is empty — an empty
/// expression is a valid "match everything" predicate but there is
/// nothing to keep.
pub fn parse_expression_extended(
    domain: ExpressionDomain,
    raw_expression: &str,
) -> anyhow::Result<Option<ParsedExpression>> {
    if raw_expression.trim().is_empty() {
        return Ok(None);
    }

    let preprocessed = preprocessor::preprocess_expression(raw_expression);
    if preprocessed.is_empty() {
        return Ok(None);
    }

    let parsed = parser::ExpressionParser::new().parse_extended(&preprocessed)?;

    trace!(
        "[EXPR_PARSE] domain={} len={} raw='{}'",
        domain,
        raw_expression.len(),
        raw_expression.chars().take(240).collect::<String>()
    );

    // Every referenced field and action target must be legal for this
    // domain; the validator produces the detailed diagnostics, here we
    // fail fast with the first offender.
    let field_errors = {
        let checker = validator::ExpressionValidator::for_domains(&[domain]);
        let mut errors = Vec::new();
        checker.check_fields(&parsed, &mut errors);
        errors
    };
    if let Some(error) = field_errors.first() {
        let mut message = error.message.clone();
        if let Some(details) = &error.details {
            message = format!("{message}. {details}");
        }
        anyhow::bail!(message);
    }

    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_names_round_trip() {
        for domain in [
            ExpressionDomain::StreamFilter,
            ExpressionDomain::EpgFilter,
            ExpressionDomain::StreamMapping,
            ExpressionDomain::EpgMapping,
        ] {
            assert_eq!(domain.as_str().parse::<ExpressionDomain>().unwrap(), domain);
        }
    }

    #[test]
    fn legacy_domain_spellings_accepted() {
        assert_eq!(
            "stream_data_mapping".parse::<ExpressionDomain>().unwrap(),
            ExpressionDomain::StreamMapping
        );
        assert_eq!(
            "epg_rule".parse::<ExpressionDomain>().unwrap(),
            ExpressionDomain::EpgMapping
        );
        assert!("bogus".parse::<ExpressionDomain>().is_err());
    }

    #[test]
    fn domain_field_sets_include_aliases() {
        let fields = ExpressionDomain::EpgMapping.valid_field_names();
        assert!(fields.contains("programme_title"));
        assert!(fields.contains("program_title"));
        assert!(!fields.contains("stream_url"));

        let stream = ExpressionDomain::StreamMapping.valid_field_names();
        assert!(stream.contains("channel_name"));
        assert!(stream.contains("logo"));
        assert!(!stream.contains("programme_title"));
    }

    #[test]
    fn parse_for_domain_happy_path() {
        let parsed = parse_expression_extended(
            ExpressionDomain::StreamFilter,
            "channel_name == \"BBC One\" && group_title != \"\"",
        )
        .unwrap()
        .expect("non-empty expression");
        assert_eq!(parsed.referenced_fields, vec!["channel_name", "group_title"]);
    }

    #[test]
    fn empty_expressions_yield_none() {
        assert!(parse_expression_extended(ExpressionDomain::StreamFilter, "")
            .unwrap()
            .is_none());
        assert!(parse_expression_extended(ExpressionDomain::StreamFilter, "   ")
            .unwrap()
            .is_none());
    }

    #[test]
    fn foreign_domain_fields_are_rejected() {
        let err = parse_expression_extended(
            ExpressionDomain::StreamFilter,
            "programme_title contains \"News\"",
        )
        .expect_err("EPG field in stream domain");
        assert!(err.to_string().contains("programme_title"));
    }
}
