//! EPG channel and programme records
//!
//! The XMLTV-side records. Programme times are kept as `chrono`
//! datetimes; the accessor exposes them as RFC3339 strings and writes
//! parse through the engine's flexible datetime formats (an unparseable
//! write is dropped with a warning rather than corrupting the record).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::expression::evaluator::FieldValueAccessor;
use crate::expression::rule_processor::ModifiableContext;
use crate::field_registry::FieldRegistry;
use crate::utils::datetime::DateTimeParser;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpgChannel {
    pub channel_id: String,
    pub channel_name: String,
    pub channel_logo: Option<String>,
    pub channel_group: Option<String>,
    pub language: Option<String>,
}

impl FieldValueAccessor for EpgChannel {
    fn field_value(&self, field: &str) -> Option<String> {
        match FieldRegistry::global().resolve(field) {
            "channel_id" => Some(self.channel_id.clone()),
            "channel_name" => Some(self.channel_name.clone()),
            "channel_logo" => self.channel_logo.clone(),
            "channel_group" => self.channel_group.clone(),
            "language" => self.language.clone(),
            _ => None,
        }
    }
}

impl ModifiableContext for EpgChannel {
    fn set_field_value(&mut self, field: &str, value: &str) {
        match FieldRegistry::global().resolve(field) {
            "channel_id" => self.channel_id = value.to_string(),
            "channel_name" => self.channel_name = value.to_string(),
            "channel_logo" => self.channel_logo = Some(value.to_string()),
            "channel_group" => self.channel_group = Some(value.to_string()),
            "language" => self.language = Some(value.to_string()),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpgProgram {
    pub channel_id: String,
    pub programme_title: String,
    pub programme_description: Option<String>,
    pub programme_category: Option<String>,
    pub programme_icon: Option<String>,
    pub programme_subtitle: Option<String>,
    pub episode_num: Option<String>,
    pub season_num: Option<String>,
    pub language: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl FieldValueAccessor for EpgProgram {
    fn field_value(&self, field: &str) -> Option<String> {
        match FieldRegistry::global().resolve(field) {
            "channel_id" => Some(self.channel_id.clone()),
            "programme_title" => Some(self.programme_title.clone()),
            "programme_description" => self.programme_description.clone(),
            "programme_category" => self.programme_category.clone(),
            "programme_icon" => self.programme_icon.clone(),
            "programme_subtitle" => self.programme_subtitle.clone(),
            "episode_num" => self.episode_num.clone(),
            "season_num" => self.season_num.clone(),
            "language" => self.language.clone(),
            "start_time" => Some(DateTimeParser::format_rfc3339(&self.start_time)),
            "end_time" => Some(DateTimeParser::format_rfc3339(&self.end_time)),
            _ => None,
        }
    }
}

impl ModifiableContext for EpgProgram {
    fn set_field_value(&mut self, field: &str, value: &str) {
        match FieldRegistry::global().resolve(field) {
            "channel_id" => self.channel_id = value.to_string(),
            "programme_title" => self.programme_title = value.to_string(),
            "programme_description" => self.programme_description = Some(value.to_string()),
            "programme_category" => self.programme_category = Some(value.to_string()),
            "programme_icon" => self.programme_icon = Some(value.to_string()),
            "programme_subtitle" => self.programme_subtitle = Some(value.to_string()),
            "episode_num" => self.episode_num = Some(value.to_string()),
            "season_num" => self.season_num = Some(value.to_string()),
            "language" => self.language = Some(value.to_string()),
            "start_time" => match DateTimeParser::parse_flexible(value) {
                Ok(dt) => self.start_time = dt,
                Err(e) => warn!("dropping start_time write: {e}"),
            },
            "end_time" => match DateTimeParser::parse_flexible(value) {
                Ok(dt) => self.end_time = dt,
                Err(e) => warn!("dropping end_time write: {e}"),
            },
            _ => {}
        }
    }
}
