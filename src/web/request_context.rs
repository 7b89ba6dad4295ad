//! HTTP request adapter
//!
//! Bridges an incoming HTTP request into the expression engine for client
//! detection: a handful of static fields derived from the request
//! (readable through the `FieldValueAccessor` contract) plus the
//! `request.headers` / `request.query` paths of the dynamic context.
//!
//! Client IP precedence: first entry of `X-Forwarded-For`, then
//! `X-Real-IP`, then the host portion of the peer address.

use http::{HeaderMap, Method, Uri};

use crate::expression::dynamic::{
    parse_dynamic_ref, DynamicContext, PATH_REQUEST_HEADERS, PATH_REQUEST_QUERY,
};
use crate::expression::evaluator::FieldValueAccessor;

/// Read-only view of one HTTP request, exposing the expression engine's
/// static request fields and populating the dynamic context.
#[derive(Debug, Clone)]
pub struct RequestContext {
    client_ip: String,
    request_path: String,
    request_url: String,
    query_params: String,
    method: String,
    host: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
}

impl RequestContext {
    pub fn from_parts(
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        remote_addr: Option<&str>,
    ) -> Self {
        let headers_vec: Vec<(String, String)> = headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();

        let client_ip = header_value(&headers_vec, "x-forwarded-for")
            .and_then(|forwarded| {
                forwarded
                    .split(',')
                    .next()
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
                    .map(str::to_string)
            })
            .or_else(|| header_value(&headers_vec, "x-real-ip"))
            .or_else(|| remote_addr.map(host_of_addr))
            .unwrap_or_default();

        let host = header_value(&headers_vec, "host")
            .or_else(|| uri.host().map(str::to_string))
            .unwrap_or_default();

        let query_params = uri.query().unwrap_or_default().to_string();
        let query = parse_query_pairs(&query_params);

        Self {
            client_ip,
            request_path: uri.path().to_string(),
            request_url: uri.to_string(),
            query_params,
            method: method.as_str().to_string(),
            host,
            headers: headers_vec,
            query,
        }
    }

    /// Copy headers and query parameters into the dynamic context under
    /// the standard `request.headers` / `request.query` paths.
    pub fn populate_context(&self, context: &mut DynamicContext) {
        for (name, value) in &self.headers {
            context.set(&format!("{PATH_REQUEST_HEADERS}.{name}"), value);
        }
        for (key, value) in &self.query {
            context.set(&format!("{PATH_REQUEST_QUERY}.{key}"), value);
        }
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }
}

impl FieldValueAccessor for RequestContext {
    /// Static request fields by name, plus `@dynamic(request.headers):…`
    /// and `@dynamic(request.query):…` references so predicates can test
    /// headers and query parameters directly. Dynamic lookups follow the
    /// context convention: empty values read as absent.
    fn field_value(&self, field: &str) -> Option<String> {
        if let Some(reference) = parse_dynamic_ref(field) {
            let value = match reference.path.as_str() {
                PATH_REQUEST_HEADERS => header_value(&self.headers, &reference.key.to_lowercase()),
                PATH_REQUEST_QUERY => self
                    .query
                    .iter()
                    .find(|(key, _)| *key == reference.key)
                    .map(|(_, value)| value.clone()),
                _ => None,
            };
            return value.filter(|v| !v.is_empty());
        }

        match field {
            "client_ip" => Some(self.client_ip.clone()),
            "request_path" => Some(self.request_path.clone()),
            "request_url" => Some(self.request_url.clone()),
            "query_params" => Some(self.query_params.clone()),
            "method" => Some(self.method.clone()),
            "host" => Some(self.host.clone()),
            _ => None,
        }
    }
}

fn header_value(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(header, _)| header == name)
        .map(|(_, value)| value.clone())
}

/// Host portion of a peer address: strips the port, keeping IPv6
/// bracketed literals intact.
fn host_of_addr(addr: &str) -> String {
    if let Some(rest) = addr.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return rest[..end].to_string();
        }
    }
    match addr.rfind(':') {
        // More than one ':' without brackets is a bare IPv6 address.
        Some(idx) if addr[..idx].contains(':') => addr.to_string(),
        Some(idx) => addr[..idx].to_string(),
        None => addr.to_string(),
    }
}

fn parse_query_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (
                urlencoding::decode(key).map_or_else(|_| key.to_string(), |c| c.into_owned()),
                urlencoding::decode(value).map_or_else(|_| value.to_string(), |c| c.into_owned()),
            )
        })
        .collect()
}
