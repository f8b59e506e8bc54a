//! Chat-completions backend (OpenAI-compatible endpoint).
//!
//! The declared array schema is wrapped under a `groups` object property,
//! since structured-output endpoints require an object at the root.
//! `decode_frame` unwraps it again.

use super::{parse, render_items, AnalysisRequest, Oracle};
use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const SCHEMA_NAME: &str = "root_cause_groups";
const MAX_ERROR_CONTENT_LEN: usize = 200;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    response_format: Json,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

pub struct HttpOracle {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpOracle {
    /// `timeout` of `None` waits indefinitely.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(HttpOracle {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }
}

fn response_format(schema: &Json) -> Json {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": SCHEMA_NAME,
            "strict": true,
            "schema": {
                "type": "object",
                "properties": { "groups": schema },
                "required": ["groups"],
                "additionalProperties": false
            }
        }
    })
}

fn truncate_for_error(text: &str) -> &str {
    crate::utils::truncate_chars(text, MAX_ERROR_CONTENT_LEN)
}

impl Oracle for HttpOracle {
    fn identity(&self) -> String {
        format!("http:{}:{}", self.endpoint, self.model)
    }

    fn analyze(&self, request: &AnalysisRequest) -> anyhow::Result<Option<Json>> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: request.prompt.clone(),
                },
                Message {
                    role: "user",
                    content: render_items(&request.items),
                },
            ],
            temperature: 0.0,
            response_format: response_format(&request.schema),
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("oracle request timed out")
                } else if e.is_connect() {
                    anyhow!("could not connect to {}", self.endpoint)
                } else {
                    e.into()
                }
            })?;
        let status = resp.status();
        let text = resp.text().context("failed to read oracle response")?;
        if !status.is_success() {
            return Err(anyhow!(
                "oracle returned HTTP {}: {}",
                status,
                truncate_for_error(&text)
            ));
        }
        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            anyhow!(
                "unexpected oracle response: {}: {}",
                e,
                truncate_for_error(&text)
            )
        })?;
        let Some(choice) = parsed.choices.into_iter().next() else {
            return Ok(None);
        };
        if let Some(refusal) = choice.message.refusal {
            tracing::warn!(rule = %request.rule_id, "oracle refused: {}", truncate_for_error(&refusal));
            return Ok(None);
        }
        Ok(choice
            .message
            .content
            .as_deref()
            .and_then(parse::first_frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::output_schema;

    #[test]
    fn test_response_format_wraps_array_schema() {
        let fmt = response_format(&output_schema());
        assert_eq!(fmt["type"], "json_schema");
        let root = &fmt["json_schema"]["schema"];
        assert_eq!(root["type"], "object");
        assert_eq!(root["properties"]["groups"]["type"], "array");
        assert_eq!(root["required"][0], "groups");
    }

    #[test]
    fn test_identity_names_endpoint_and_model() {
        let oracle = HttpOracle::new("http://localhost:9/v1", "m1", "k", None).unwrap();
        assert_eq!(oracle.identity(), "http:http://localhost:9/v1:m1");
    }

    #[test]
    fn test_chat_response_content_yields_frame() {
        let raw = r#"{"choices":[{"message":{"content":"{\"groups\":[]}"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        let content = parsed.choices[0].message.content.as_deref().unwrap();
        assert!(parse::first_frame(content).unwrap()["groups"].is_array());
    }
}
