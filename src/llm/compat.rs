//! 裸 HTTP 的 OpenAI 线协议客户端
//!
//! 面向只实现部分 OpenAI 线协议的自建 / 代理端点：
//! - chat 端点返回 404 时降级一次到 /completions（消息拍平为单段 prompt）；
//! - 流式走 SSE `data:` 行解析，兼容 chat 与 completions 两种 chunk 形状；
//! - complete_json 在输出不是合法 JSON 时追加一次模型辅助修复轮，再失败才放弃。

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::core::LlmError;
use crate::llm::{ChatMessage, LlmClient, TokenStream};

/// OpenAI 线协议兼容客户端
pub struct CompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl CompatClient {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<&str>,
        request_timeout_secs: u64,
    ) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(request_timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
        }
    }

    async fn post_chat(
        &self,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        self.http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "stream": stream,
            }))
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))
    }

    /// chat 端点缺失时的降级路径：/completions + 拍平 prompt
    async fn complete_via_completions(
        &self,
        messages: &[ChatMessage],
    ) -> Result<String, LlmError> {
        let response = self
            .http
            .post(format!("{}/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "prompt": flatten_prompt(messages),
                "stream": false,
            }))
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let body = check_status(response).await?;
        body["choices"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::Api("completions response missing choices[0].text".into()))
    }
}

#[async_trait]
impl LlmClient for CompatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let response = self.post_chat(messages, false).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!("chat endpoint not found, falling back to /completions");
            return self.complete_via_completions(messages).await;
        }

        let body = check_status(response).await?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| LlmError::Api("chat response missing message content".into()))
    }

    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        let response = self.post_chat(messages, true).await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::warn!("chat endpoint not found, falling back to /completions");
            let text = self.complete_via_completions(messages).await?;
            return Ok(Box::pin(stream::iter(vec![Ok::<_, LlmError>(text)])));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{}: {}", status, truncate(&body, 300))));
        }

        let (tx, rx) = mpsc::channel::<Result<String, LlmError>>(64);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut buffer = String::new();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        buffer.push_str(&String::from_utf8_lossy(&chunk));
                        while let Some(pos) = buffer.find('\n') {
                            let line = buffer[..pos].trim().to_string();
                            buffer.drain(..=pos);
                            let Some(data) = parse_sse_data(&line) else {
                                continue;
                            };
                            if data == "[DONE]" {
                                return;
                            }
                            if let Some(token) = chunk_token(data) {
                                if !token.is_empty() && tx.send(Ok(token)).await.is_err() {
                                    return; // 接收端已放弃
                                }
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Stream(e.to_string()))).await;
                        return;
                    }
                }
            }
        });

        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }

    /// 结构化输出：一次修复机会，修复后仍非法才报 Malformed
    async fn complete_json(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let text = self.complete(messages).await?;
        if serde_json::from_str::<Value>(text.trim()).is_ok() {
            return Ok(text);
        }

        tracing::warn!("structured output was not valid JSON, attempting one repair pass");
        // 原始输出作为 assistant 轮回放，让模型修自己的上一条回复
        let repair = vec![
            ChatMessage::system(
                "You repair malformed JSON. Reply with the corrected JSON only, \
                 no code fences, no commentary.",
            ),
            ChatMessage::assistant(text),
            ChatMessage::user(
                "The previous reply was supposed to be valid JSON but is not. \
                 Return it as strictly valid JSON.",
            ),
        ];
        let repaired = self.complete(&repair).await?;
        match serde_json::from_str::<Value>(repaired.trim()) {
            Ok(_) => Ok(repaired),
            Err(e) => Err(LlmError::Malformed(e.to_string())),
        }
    }
}

async fn check_status(response: reqwest::Response) -> Result<Value, LlmError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Api(format!("{}: {}", status, truncate(&body, 300))));
    }
    response
        .json::<Value>()
        .await
        .map_err(|e| LlmError::Api(e.to_string()))
}

/// 消息列表拍平为 completions 的单段 prompt
pub(crate) fn flatten_prompt(messages: &[ChatMessage]) -> String {
    let mut prompt = String::new();
    for m in messages {
        let role = match m.role {
            crate::llm::Role::System => "system",
            crate::llm::Role::User => "user",
            crate::llm::Role::Assistant => "assistant",
        };
        prompt.push_str(role);
        prompt.push_str(": ");
        prompt.push_str(&m.content);
        prompt.push_str("\n\n");
    }
    prompt.push_str("assistant:");
    prompt
}

/// SSE 行 → data 负载（非 data 行返回 None）
pub(crate) fn parse_sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// 从一个流式 chunk 提取文本：chat 的 delta.content 或 completions 的 text
pub(crate) fn chunk_token(data: &str) -> Option<String> {
    let value: Value = serde_json::from_str(data).ok()?;
    let choice = value["choices"].get(0)?;
    choice["delta"]["content"]
        .as_str()
        .or_else(|| choice["text"].as_str())
        .map(|s| s.to_string())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn flatten_prompt_keeps_role_order() {
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
        ];
        let prompt = flatten_prompt(&messages);
        assert!(prompt.starts_with("system: be brief"));
        assert!(prompt.contains("user: hello"));
        assert!(prompt.ends_with("assistant:"));
        assert_eq!(messages[1].role, Role::User);
    }

    #[test]
    fn sse_data_lines() {
        assert_eq!(parse_sse_data("data: {\"x\":1}"), Some("{\"x\":1}"));
        assert_eq!(parse_sse_data("data: [DONE]"), Some("[DONE]"));
        assert_eq!(parse_sse_data(": keep-alive"), None);
        assert_eq!(parse_sse_data(""), None);
    }

    #[test]
    fn chunk_token_handles_both_wire_shapes() {
        let chat = r#"{"choices":[{"delta":{"content":"hi"}}]}"#;
        assert_eq!(chunk_token(chat).as_deref(), Some("hi"));

        let completions = r#"{"choices":[{"text":"there"}]}"#;
        assert_eq!(chunk_token(completions).as_deref(), Some("there"));

        assert_eq!(chunk_token(r#"{"choices":[]}"#), None);
        assert_eq!(chunk_token("not json"), None);
    }
}
