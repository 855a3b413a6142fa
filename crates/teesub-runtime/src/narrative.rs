//! Narrative report over the Anthropic messages API.

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::NarrativeConfig;
use crate::enrich::{EnrichmentError, NarrativeRequest, Narrator};

pub const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2000;
const TEMPERATURE: f64 = 0.1;

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

pub struct AnthropicNarrator {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl AnthropicNarrator {
    pub fn new(config: &NarrativeConfig) -> Result<Self, EnrichmentError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("teesub/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EnrichmentError::Unavailable(format!("http client: {e}")))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            endpoint: MESSAGES_URL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Narrator for AnthropicNarrator {
    fn narrate(&self, request: &NarrativeRequest) -> Result<Value, EnrichmentError> {
        let body = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "temperature": TEMPERATURE,
            "messages": [{ "role": "user", "content": build_prompt(request) }],
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(|e| EnrichmentError::Unavailable(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EnrichmentError::Unavailable(format!(
                "messages API answered {status}"
            )));
        }

        let parsed: MessagesResponse = resp
            .json()
            .map_err(|e| EnrichmentError::Malformed(format!("response body: {e}")))?;

        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();

        parse_narrative_text(&text)
    }
}

/// Parse model output into a JSON object, tolerating a Markdown code fence.
pub fn parse_narrative_text(text: &str) -> Result<Value, EnrichmentError> {
    let cleaned = strip_code_fence(text.trim());
    let value: Value = serde_json::from_str(cleaned)
        .map_err(|e| EnrichmentError::Malformed(format!("narrative is not JSON: {e}")))?;
    if !value.is_object() {
        return Err(EnrichmentError::Malformed(
            "narrative must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}

fn build_prompt(request: &NarrativeRequest) -> String {
    let stats = serde_json::to_string(&request.stats).unwrap_or_else(|_| "{}".to_string());
    format!(
        "You are the reporting stage of a compliance engine that runs inside a TEE.\n\
         Write a JSON report describing the dataset below. Use plausible, clearly synthetic \
         values for anything you cannot know; you are not connected to any chain.\n\
         \n\
         Requirements:\n\
         - Output one JSON object and nothing else: no Markdown, no comments.\n\
         - Include a top-level boolean field \"weapon_flag\" set to {weapon_flag}.\n\
         - Include a top-level string field \"dataset_id\" set to \"{dataset_id}\".\n\
         - Include sections \"dataset_insights\", \"input_validation\" and \"processing_steps\".\n\
         \n\
         Dataset statistics: {stats}\n",
        weapon_flag = request.weapon_flag,
        dataset_id = request.dataset_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::DatasetStats;

    #[test]
    fn parses_plain_and_fenced_json() {
        let plain = parse_narrative_text(r#"{"a":1}"#).unwrap();
        assert_eq!(plain["a"], 1);

        let fenced = parse_narrative_text("```json\n{\"a\": 2}\n```").unwrap();
        assert_eq!(fenced["a"], 2);

        let bare_fence = parse_narrative_text("```\n{\"a\": 3}\n```").unwrap();
        assert_eq!(bare_fence["a"], 3);
    }

    #[test]
    fn non_object_or_garbage_is_malformed() {
        assert!(matches!(
            parse_narrative_text("[1, 2]"),
            Err(EnrichmentError::Malformed(_))
        ));
        assert!(matches!(
            parse_narrative_text("Sure! Here is your report"),
            Err(EnrichmentError::Malformed(_))
        ));
    }

    #[test]
    fn prompt_carries_flag_and_stats() {
        let request = NarrativeRequest {
            dataset_id: "ds-9".to_string(),
            stats: DatasetStats {
                file_count: 4,
                ..DatasetStats::default()
            },
            weapon_flag: true,
        };
        let prompt = build_prompt(&request);
        assert!(prompt.contains("\"weapon_flag\" set to true"));
        assert!(prompt.contains("\"ds-9\""));
        assert!(prompt.contains("\"fileCount\":4"));
    }

    #[test]
    fn unreachable_endpoint_is_unavailable() {
        let config = NarrativeConfig {
            api_key: "sk-test".to_string(),
            model: "m".to_string(),
            timeout: std::time::Duration::from_secs(2),
        };
        let narrator = AnthropicNarrator::new(&config)
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/v1/messages");
        let request = NarrativeRequest {
            dataset_id: "ds".to_string(),
            stats: DatasetStats::default(),
            weapon_flag: false,
        };
        assert!(matches!(
            narrator.narrate(&request),
            Err(EnrichmentError::Unavailable(_))
        ));
    }
}
