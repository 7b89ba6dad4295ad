//! Time helper
//!
//! `@time:<operation>[|arg…]` in action values, evaluated immediately by
//! the rule processor:
//!
//! - `@time:now` / `@time:now|<layout>` — current UTC, RFC3339 or a
//!   strftime layout
//! - `@time:parse|<input>` — parse via the engine's fixed layout list,
//!   return RFC3339
//! - `@time:format|<rfc3339>|<layout>` — reformat an RFC3339 timestamp
//! - `@time:add|<rfc3339>|<duration>` — add a duration string (`1h30m`,
//!   `-45m`) to a timestamp, return RFC3339

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use crate::errors::HelperError;
use crate::helpers::Helper;
use crate::utils::datetime::DateTimeParser;

pub struct TimeHelper;

impl TimeHelper {
    pub fn new() -> Self {
        Self
    }

    fn format_with_layout(dt: &DateTime<Utc>, layout: &str) -> Result<String, HelperError> {
        let items: Vec<Item<'_>> = StrftimeItems::new(layout).collect();
        if items.iter().any(|item| matches!(item, Item::Error)) {
            return Err(HelperError::time(format!("invalid layout '{layout}'")));
        }
        Ok(dt.format_with_items(items.into_iter()).to_string())
    }

    fn parse_rfc3339(input: &str) -> Result<DateTime<Utc>, HelperError> {
        DateTime::parse_from_rfc3339(input)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| HelperError::time(format!("invalid RFC3339 timestamp '{input}': {e}")))
    }

    fn op_now(args: &[&str]) -> Result<String, HelperError> {
        let now = Utc::now();
        match args.first() {
            Some(layout) => Self::format_with_layout(&now, layout),
            None => Ok(DateTimeParser::format_rfc3339(&now)),
        }
    }

    fn op_parse(args: &[&str]) -> Result<String, HelperError> {
        let input = args
            .first()
            .ok_or_else(|| HelperError::invalid_arguments("time", "parse requires an input"))?;
        let dt = DateTimeParser::parse_flexible(input)
            .map_err(|e| HelperError::time(e.to_string()))?;
        Ok(DateTimeParser::format_rfc3339(&dt))
    }

    fn op_format(args: &[&str]) -> Result<String, HelperError> {
        let [input, layout] = args else {
            return Err(HelperError::invalid_arguments(
                "time",
                "format requires input and layout",
            ));
        };
        let dt = Self::parse_rfc3339(input)?;
        Self::format_with_layout(&dt, layout)
    }

    fn op_add(args: &[&str]) -> Result<String, HelperError> {
        let [input, duration_str] = args else {
            return Err(HelperError::invalid_arguments(
                "time",
                "add requires a timestamp and a duration",
            ));
        };
        let dt = Self::parse_rfc3339(input)?;

        // humantime durations are unsigned; a leading '-' subtracts
        let (negative, body) = match duration_str.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, duration_str.strip_prefix('+').unwrap_or(duration_str)),
        };
        let std_duration = humantime::parse_duration(body)
            .map_err(|e| HelperError::time(format!("invalid duration '{duration_str}': {e}")))?;
        let delta = chrono::Duration::from_std(std_duration)
            .map_err(|_| HelperError::time(format!("duration '{duration_str}' out of range")))?;

        let shifted = if negative { dt - delta } else { dt + delta };
        Ok(DateTimeParser::format_rfc3339(&shifted))
    }
}

impl Default for TimeHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Helper for TimeHelper {
    fn name(&self) -> &str {
        "time"
    }

    fn process(&self, args: &str) -> Result<String, HelperError> {
        let mut segments = args.split('|');
        let operation = segments.next().unwrap_or_default();
        let rest: Vec<&str> = segments.collect();

        match operation {
            "now" => Self::op_now(&rest),
            "parse" => Self::op_parse(&rest),
            "format" => Self::op_format(&rest),
            "add" => Self::op_add(&rest),
            other => Err(HelperError::unknown_operation("time", other)),
        }
    }
}
