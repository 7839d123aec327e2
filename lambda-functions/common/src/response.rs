use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use tracing::error;

pub type Headers = BTreeMap<String, Value>;

/// API Gateway proxy response. `body` is always JSON-encoded text.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub headers: Headers,
    pub body: String,
}

impl ApiResponse {
    pub fn json_body(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}

pub fn default_headers() -> Headers {
    let mut headers = Headers::new();
    headers.insert("Content-Type".to_string(), json!("application/json"));
    headers.insert("Access-Control-Allow-Origin".to_string(), json!("*"));
    headers.insert("Access-Control-Allow-Credentials".to_string(), json!(true));
    headers
}

/// Builds a response envelope. Caller-supplied headers replace the defaults
/// entirely rather than being merged into them.
pub fn format_response(status_code: u16, body: Value, headers: Option<Headers>) -> ApiResponse {
    ApiResponse {
        status_code,
        headers: headers.unwrap_or_else(default_headers),
        body: body.to_string(),
    }
}

pub fn error_response(status_code: u16, message: impl Display) -> ApiResponse {
    format_response(status_code, json!({ "error": message.to_string() }), None)
}

/// Runs a handler future and turns any error it returns into a 500 response
/// carrying the error message.
pub async fn handle_error<F>(operation: &str, handler: F) -> ApiResponse
where
    F: Future<Output = anyhow::Result<ApiResponse>>,
{
    match handler.await {
        Ok(response) => response,
        Err(e) => {
            error!("Error in {}: {:#}", operation, e);
            error_response(500, e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_format_response_default_headers() {
        let response = format_response(200, json!({"message": "Success"}), None);

        assert_eq!(response.status_code, 200);
        assert_eq!(response.json_body().unwrap(), json!({"message": "Success"}));
        assert_eq!(response.headers["Content-Type"], "application/json");
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(response.headers["Access-Control-Allow-Credentials"], true);
    }

    #[test]
    fn test_format_response_custom_headers_replace_defaults() {
        let mut headers = Headers::new();
        headers.insert("X-Custom-Header".to_string(), json!("test-value"));

        let response = format_response(201, json!({"id": "123"}), Some(headers.clone()));

        assert_eq!(response.status_code, 201);
        assert_eq!(response.headers, headers);
        assert!(!response.headers.contains_key("Content-Type"));
    }

    #[test]
    fn test_response_serialization() {
        let response = error_response(400, "Bad Request");
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["statusCode"], 400);
        assert_eq!(json["headers"]["Access-Control-Allow-Credentials"], true);
        assert_eq!(json["body"], r#"{"error":"Bad Request"}"#);
    }

    #[tokio::test]
    async fn test_handle_error_passes_success_through() {
        let expected = format_response(200, json!({"success": true}), None);
        let response = handle_error("test", async { Ok(expected.clone()) }).await;
        assert_eq!(response, expected);
    }

    #[tokio::test]
    async fn test_handle_error_converts_failure() {
        let response = handle_error("test", async { Err(anyhow!("division by zero")) }).await;

        assert_eq!(response.status_code, 500);
        assert!(response.headers.contains_key("Content-Type"));
        assert!(response.headers.contains_key("Access-Control-Allow-Origin"));
        assert_eq!(response.json_body().unwrap(), json!({"error": "division by zero"}));
    }
}
