use reqwest::Client;
use serde_json::{json, Map, Value};

use crate::registry::Tool;
use crate::schema::{FieldType, Schema};

/// A tool that lets the model make HTTP requests.
///
/// Request failures are reported inside the result payload so the model can
/// react to them; only the loop's own transport problems are fatal.
pub fn http_request_tool() -> Tool {
    let schema = Schema::new()
        .field(
            "method",
            FieldType::one_of(["get", "post", "put", "patch", "delete"]),
            "HTTP method",
        )
        .field("url", FieldType::string(), "URL to make the request to")
        .optional("headers", FieldType::Map, "HTTP headers")
        .optional("params", FieldType::Map, "Query parameters")
        .optional("body", FieldType::Any, "Request body (for POST/PUT/PATCH)");

    Tool::new(
        "http_request",
        "Makes HTTP requests with customizable method, URL, headers, parameters and body",
        schema,
        |arguments: Value| async move {
            Ok(match send(&arguments).await {
                Ok(result) => result,
                Err(error) => json!({ "error": error.to_string() }),
            })
        },
    )
}

async fn send(arguments: &Value) -> anyhow::Result<Value> {
    let method = arguments["method"].as_str().unwrap_or("get");
    let url = arguments["url"].as_str().unwrap_or_default();

    let client = Client::new();
    let mut request = match method {
        "post" => client.post(url),
        "put" => client.put(url),
        "patch" => client.patch(url),
        "delete" => client.delete(url),
        _ => client.get(url),
    };

    if let Some(headers) = arguments.get("headers").and_then(|h| h.as_object()) {
        for (name, value) in headers {
            if let Some(value) = value.as_str() {
                request = request.header(name, value);
            }
        }
    }
    if let Some(params) = arguments.get("params").and_then(|p| p.as_object()) {
        let pairs: Vec<(String, String)> = params
            .iter()
            .map(|(name, value)| (name.clone(), plain_string(value)))
            .collect();
        request = request.query(&pairs);
    }
    match arguments.get("body") {
        None | Some(Value::Null) => {}
        Some(body @ (Value::Object(_) | Value::Array(_))) => request = request.json(body),
        Some(other) => request = request.body(plain_string(other)),
    }

    let response = request.send().await?;
    let status_code = response.status().as_u16();
    let headers: Map<String, Value> = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
            )
        })
        .collect();
    let is_json = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("application/json"))
        .unwrap_or(false);
    let content = response.text().await?;
    let json_body: Option<Value> = is_json
        .then(|| serde_json::from_str(&content).ok())
        .flatten();

    Ok(json!({
        "status_code": status_code,
        "headers": headers,
        "content": content,
        "json": json_body,
    }))
}

fn plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
