//! Stream channel record
//!
//! The M3U-side record the filter and mapping engines operate on.
//! Implements the accessor contracts with alias-aware field resolution,
//! so expressions may use `logo` or `channel_number` interchangeably with
//! the canonical `tvg_logo` / `tvg_chno`.

use serde::{Deserialize, Serialize};

use crate::expression::evaluator::FieldValueAccessor;
use crate::expression::rule_processor::ModifiableContext;
use crate::field_registry::FieldRegistry;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub tvg_id: Option<String>,
    pub tvg_name: Option<String>,
    pub tvg_logo: Option<String>,
    /// Timeshift offset for M3U (e.g. "+1", "+24")
    pub tvg_shift: Option<String>,
    pub tvg_chno: Option<String>,
    pub group_title: Option<String>,
    pub channel_name: String,
    pub stream_url: String,
}

impl FieldValueAccessor for Channel {
    fn field_value(&self, field: &str) -> Option<String> {
        match FieldRegistry::global().resolve(field) {
            "tvg_id" => self.tvg_id.clone(),
            "tvg_name" => self.tvg_name.clone(),
            "tvg_logo" => self.tvg_logo.clone(),
            "tvg_shift" => self.tvg_shift.clone(),
            "tvg_chno" => self.tvg_chno.clone(),
            "group_title" => self.group_title.clone(),
            "channel_name" => Some(self.channel_name.clone()),
            "stream_url" => Some(self.stream_url.clone()),
            _ => None,
        }
    }
}

impl ModifiableContext for Channel {
    /// Unknown fields are ignored; the validator catches them at
    /// authoring time.
    fn set_field_value(&mut self, field: &str, value: &str) {
        match FieldRegistry::global().resolve(field) {
            "tvg_id" => self.tvg_id = Some(value.to_string()),
            "tvg_name" => self.tvg_name = Some(value.to_string()),
            "tvg_logo" => self.tvg_logo = Some(value.to_string()),
            "tvg_shift" => self.tvg_shift = Some(value.to_string()),
            "tvg_chno" => self.tvg_chno = Some(value.to_string()),
            "group_title" => self.group_title = Some(value.to_string()),
            "channel_name" => self.channel_name = value.to_string(),
            "stream_url" => self.stream_url = value.to_string(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_mapping::DataMappingEngine;
    use crate::expression::parser::ExpressionParser;

    fn channel(name: &str) -> Channel {
        Channel {
            channel_name: name.to_string(),
            stream_url: "http://upstream.example.com/1.ts".to_string(),
            ..Channel::default()
        }
    }

    #[test]
    fn reads_resolve_aliases() {
        let mut ch = channel("BBC One");
        ch.tvg_logo = Some("bbc.png".to_string());
        ch.tvg_chno = Some("101".to_string());

        assert_eq!(ch.field_value("tvg_logo").unwrap(), "bbc.png");
        assert_eq!(ch.field_value("logo").unwrap(), "bbc.png");
        assert_eq!(ch.field_value("channel_number").unwrap(), "101");
        assert_eq!(ch.field_value("programme_title"), None);
    }

    #[test]
    fn writes_resolve_aliases() {
        let mut ch = channel("BBC One");
        ch.set_field_value("logo", "new.png");
        assert_eq!(ch.tvg_logo.as_deref(), Some("new.png"));

        ch.set_field_value("not_a_field", "ignored");
        assert_eq!(ch.field_value("not_a_field"), None);
    }

    #[test]
    fn mapping_rules_run_against_channels() {
        let parser = ExpressionParser::new();
        let mut engine = DataMappingEngine::new();
        engine.add_rule(
            "strip-hd",
            parser
                .parse_extended("channel_name matches \"(.+) HD$\" SET channel_name = $1, group_title = \"HD\"")
                .unwrap(),
        );

        let mut ch = channel("BBC One HD");
        let result = engine.process(&mut ch).unwrap();
        assert_eq!(result.rules_matched, 1);
        assert_eq!(ch.channel_name, "BBC One");
        assert_eq!(ch.group_title.as_deref(), Some("HD"));
    }
}
