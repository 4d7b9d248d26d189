//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 按脚本分片回放一段固定文本，便于本地跑通「流式接收 → 缓冲 → 解析计划」全链路。

use async_trait::async_trait;
use futures_util::stream;

use crate::core::LlmError;
use crate::llm::{ChatMessage, LlmClient, TokenStream};

/// Mock 客户端：complete 返回整段脚本，complete_stream 按分片回放
#[derive(Debug, Default)]
pub struct MockLlmClient {
    chunks: Vec<String>,
}

impl MockLlmClient {
    /// 单段脚本
    pub fn scripted(text: impl Into<String>) -> Self {
        Self {
            chunks: vec![text.into()],
        }
    }

    /// 多段分片脚本（模拟增量 Token）
    pub fn chunked(chunks: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        Ok(self.chunks.concat())
    }

    async fn complete_stream(&self, _messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        let items: Vec<Result<String, LlmError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

/// 总是失败的客户端：驱动错误路径测试
#[derive(Debug, Default)]
pub struct FailingLlmClient;

#[async_trait]
impl LlmClient for FailingLlmClient {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, LlmError> {
        Err(LlmError::Http("connection refused".into()))
    }

    async fn complete_stream(&self, _messages: &[ChatMessage]) -> Result<TokenStream, LlmError> {
        Err(LlmError::Http("connection refused".into()))
    }
}
