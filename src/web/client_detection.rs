//! Client detection
//!
//! Ordered rules over the HTTP request context that derive a per-client
//! profile: conditions read the request's static fields (`client_ip`,
//! `request_path`, `method`, …), values pull from `request.headers` /
//! `request.query`, and actions write profile fields such as
//! `preferred_video_codec` that downstream response handling consults.
//!
//! A typical rule set:
//!
//! ```text
//! @dynamic(request.headers):x-video-codec not equals "" SET preferred_video_codec = @dynamic(request.headers):x-video-codec
//! client_ip starts_with "10." SET profile_name = "lan"
//! true SET_IF_EMPTY profile_name = "default"
//! ```

use std::collections::HashMap;

use crate::data_mapping::{DataMappingEngine, DataMappingEngineConfig};
use crate::errors::ExpressionError;
use crate::expression::dynamic::DynamicFieldRegistry;
use crate::expression::evaluator::FieldValueAccessor;
use crate::expression::rule_processor::ModifiableContext;
use crate::models::{MappingResult, ParsedExpression};
use crate::web::RequestContext;

/// Mutable per-client profile layered over the read-only request
/// fields: reads consult the request first, writes land in the profile.
struct ClientProfile<'a> {
    request: &'a RequestContext,
    values: HashMap<String, String>,
}

impl FieldValueAccessor for ClientProfile<'_> {
    fn field_value(&self, field: &str) -> Option<String> {
        self.request
            .field_value(field)
            .or_else(|| self.values.get(field).cloned())
    }
}

impl ModifiableContext for ClientProfile<'_> {
    fn set_field_value(&mut self, field: &str, value: &str) {
        self.values.insert(field.to_string(), value.to_string());
    }
}

/// Result of running the detection rules for one request.
#[derive(Debug, Clone)]
pub struct ClientDetection {
    /// Profile fields written by the matched rules.
    pub values: HashMap<String, String>,
    pub result: MappingResult,
}

impl ClientDetection {
    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }
}

/// Ordered client-detection rule set.
pub struct ClientDetector {
    engine: DataMappingEngine,
}

impl ClientDetector {
    pub fn new() -> Self {
        Self::with_config(DataMappingEngineConfig::default())
    }

    /// `stop_on_first_match` gives exclusive profiles: the first matching
    /// rule decides and later rules never run.
    pub fn with_config(config: DataMappingEngineConfig) -> Self {
        Self {
            engine: DataMappingEngine::with_config(config),
        }
    }

    pub fn add_rule(&mut self, name: &str, expression: ParsedExpression) {
        self.engine.add_rule(name, expression);
    }

    /// Run the rules against one request.
    pub fn detect(&self, request: &RequestContext) -> Result<ClientDetection, ExpressionError> {
        let mut dynamic = DynamicFieldRegistry::new();
        request.populate_context(dynamic.context_mut());

        let mut profile = ClientProfile {
            request,
            values: HashMap::new(),
        };
        let result = self.engine.process_with_dynamic(&mut profile, &dynamic)?;

        Ok(ClientDetection {
            values: profile.values,
            result,
        })
    }
}

impl Default for ClientDetector {
    fn default() -> Self {
        Self::new()
    }
}
