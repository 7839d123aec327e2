use anyhow::{bail, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// API Gateway proxy event. Every field is optional and an explicit `null`
/// is treated the same as a missing key.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    pub http_method: Option<String>,
    pub path: Option<String>,
    /// Raw JSON text, or a payload that was already decoded upstream.
    pub body: Option<Value>,
    pub path_parameters: Option<HashMap<String, String>>,
    pub query_string_parameters: Option<HashMap<String, String>>,
    pub request_context: Option<RequestContext>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    pub authorizer: Option<Authorizer>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Authorizer {
    pub claims: Option<Map<String, Value>>,
}

impl ApiEvent {
    pub fn http_method(&self) -> &str {
        self.http_method.as_deref().unwrap_or("GET")
    }

    /// Decodes the request body into a JSON object.
    ///
    /// A missing body yields an empty object. Malformed JSON, or JSON that is
    /// not an object, is returned as an error.
    pub fn extract_body(&self) -> Result<Map<String, Value>> {
        let decoded = match &self.body {
            None => return Ok(Map::new()),
            Some(Value::String(raw)) => serde_json::from_str(raw)?,
            Some(value) => value.clone(),
        };

        match decoded {
            Value::Object(map) => Ok(map),
            other => bail!("Request body must be a JSON object, got {}", json_type(&other)),
        }
    }

    pub fn path_parameters(&self) -> HashMap<String, String> {
        self.path_parameters.clone().unwrap_or_default()
    }

    pub fn query_parameters(&self) -> HashMap<String, String> {
        self.query_string_parameters.clone().unwrap_or_default()
    }

    /// Caller identity from a JWT authorizer: `sub`, else `cognito:username`.
    pub fn user_id(&self) -> Option<String> {
        let claims = self
            .request_context
            .as_ref()?
            .authorizer
            .as_ref()?
            .claims
            .as_ref()?;

        ["sub", "cognito:username"]
            .iter()
            .filter_map(|claim| claims.get(*claim).and_then(Value::as_str))
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
