use crate::config::toml_config::ProviderConfig;
use crate::domain::ports::{CompletionClient, CompletionMode, MessageRole, Prompt};
use crate::utils::error::{Result, RoadmapError};
use crate::utils::validation::validate_url;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OpenAI 相容的 `/v1/chat/completions` 用戶端
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    chat_temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: MessageRole,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        validate_url("provider.base_url", &config.base_url)?;
        let api_key = config.resolved_api_key()?.to_string();

        let mut builder = Client::builder();
        if let Some(seconds) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let client = builder.build()?;

        let endpoint = format!(
            "{}/v1/chat/completions",
            config.base_url.trim_end_matches('/')
        );

        Ok(Self {
            client,
            endpoint,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            chat_temperature: config.chat_temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_request<'a>(&'a self, prompt: &'a Prompt, mode: CompletionMode) -> ChatCompletionRequest<'a> {
        let messages = vec![ChatMessage {
            role: prompt.role,
            content: &prompt.text,
        }];

        match mode {
            CompletionMode::Structured => ChatCompletionRequest {
                model: &self.model,
                messages,
                temperature: self.temperature,
                max_tokens: Some(self.max_tokens),
                response_format: Some(ResponseFormat {
                    r#type: "json_object",
                }),
            },
            CompletionMode::FreeText => ChatCompletionRequest {
                model: &self.model,
                messages,
                temperature: self.chat_temperature,
                max_tokens: None,
                response_format: None,
            },
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &Prompt, mode: CompletionMode) -> Result<String> {
        let payload = self.build_request(prompt, mode);

        tracing::debug!(
            "Sending {:?} completion request to {} (model: {}, prompt: {} chars)",
            mode,
            self.endpoint,
            self.model,
            prompt.text.len()
        );

        // 單次呼叫，不重試
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("Provider response status: {}", status);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read error body: {}>", e));
            return Err(RoadmapError::completion(format!(
                "provider returned {}: {}",
                status, body
            )));
        }

        let envelope: ChatCompletionResponse = response.json().await.map_err(|e| {
            RoadmapError::completion(format!("failed to decode provider response: {}", e))
        })?;

        let content = envelope
            .choices
            .into_iter()
            .find_map(|choice| choice.message.and_then(|message| message.content))
            .ok_or_else(|| RoadmapError::completion("provider response contained no choices"))?;

        if content.trim().is_empty() {
            return Err(RoadmapError::completion("provider returned an empty completion"));
        }

        tracing::debug!("Received completion ({} chars)", content.len());
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ErrorCategory;
    use httpmock::prelude::*;
    use serde_json::json;

    fn config_for(server: &MockServer) -> ProviderConfig {
        ProviderConfig {
            base_url: server.base_url(),
            api_key: Some("sk-test".to_string()),
            model: "test-model".to_string(),
            temperature: 0.7,
            max_tokens: 4000,
            chat_temperature: 0.8,
            timeout_seconds: Some(5),
        }
    }

    fn envelope(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        })
    }

    #[tokio::test]
    async fn test_structured_completion_requests_json_output() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-test")
                .json_body_partial(
                    r#"{"model": "test-model", "temperature": 0.7, "max_tokens": 4000, "response_format": {"type": "json_object"}, "messages": [{"role": "user", "content": "make a roadmap"}]}"#,
                );
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(envelope(r#"{"modules": []}"#));
        });

        let client = OpenAiClient::new(&config_for(&server)).unwrap();
        let text = client
            .complete(&Prompt::user("make a roadmap"), CompletionMode::Structured)
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(text, r#"{"modules": []}"#);
    }

    #[tokio::test]
    async fn test_free_text_completion_uses_chat_settings() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions").json_body_partial(
                r#"{"temperature": 0.8, "messages": [{"role": "system", "content": "be socratic"}]}"#,
            );
            then.status(200).json_body(envelope("What have you tried so far?"));
        });

        let client = OpenAiClient::new(&config_for(&server)).unwrap();
        let text = client
            .complete(&Prompt::system("be socratic"), CompletionMode::FreeText)
            .await
            .unwrap();

        api_mock.assert();
        assert_eq!(text, "What have you tried so far?");
    }

    #[test]
    fn test_free_text_request_omits_json_hint() {
        let config = ProviderConfig {
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        };
        let client = OpenAiClient::new(&config).unwrap();
        let prompt = Prompt::system("hello");

        let body = serde_json::to_value(client.build_request(&prompt, CompletionMode::FreeText)).unwrap();
        assert!(body.get("response_format").is_none());
        assert!(body.get("max_tokens").is_none());

        let body = serde_json::to_value(client.build_request(&prompt, CompletionMode::Structured)).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[tokio::test]
    async fn test_provider_error_is_completion_failure() {
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(503).body("overloaded");
        });

        let client = OpenAiClient::new(&config_for(&server)).unwrap();
        let err = client
            .complete(&Prompt::user("x"), CompletionMode::Structured)
            .await
            .unwrap_err();

        api_mock.assert();
        assert_eq!(err.category(), ErrorCategory::Completion);
        assert!(err.to_string().contains("overloaded"));
    }

    /// 回應標頭宣告的長度大於實際送出的內容，讀取 body 時必定失敗
    async fn serve_truncated_error_once() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&request).to_lowercase();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let body_len = text[..header_end]
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + body_len {
                        break;
                    }
                }
            }

            socket
                .write_all(b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 100\r\n\r\npartial")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_unreadable_error_body_is_reported() {
        let config = ProviderConfig {
            base_url: serve_truncated_error_once().await,
            api_key: Some("sk-test".to_string()),
            timeout_seconds: Some(5),
            ..Default::default()
        };
        let client = OpenAiClient::new(&config).unwrap();

        let err = client
            .complete(&Prompt::user("x"), CompletionMode::Structured)
            .await
            .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Completion);
        let message = err.to_string();
        assert!(message.contains("502"));
        assert!(message.contains("failed to read error body"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_completion_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({"choices": []}));
        });

        let client = OpenAiClient::new(&config_for(&server)).unwrap();
        let err = client
            .complete(&Prompt::user("x"), CompletionMode::FreeText)
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Completion);
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_completion_failure() {
        let config = ProviderConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: Some("sk-test".to_string()),
            timeout_seconds: Some(2),
            ..Default::default()
        };
        let client = OpenAiClient::new(&config).unwrap();
        let err = client
            .complete(&Prompt::user("x"), CompletionMode::Structured)
            .await
            .unwrap_err();
        assert!(matches!(err, RoadmapError::HttpError(_)));
        assert_eq!(err.category(), ErrorCategory::Completion);
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let err = OpenAiClient::new(&ProviderConfig::default()).unwrap_err();
        assert!(matches!(err, RoadmapError::MissingConfigError { .. }));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let config = ProviderConfig {
            base_url: "https://llm.example.com/".to_string(),
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        let client = OpenAiClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "https://llm.example.com/v1/chat/completions");
    }
}
