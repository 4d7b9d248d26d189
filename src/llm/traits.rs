//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / 裸 HTTP 兼容端点 / Mock）实现 LlmClient：
//! complete（非流式）、complete_stream（流式 Token）。complete_json 带默认
//! 实现（只校验不修复）；需要模型辅助修复的后端自行覆盖。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::core::LlmError;

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 单条角色标记消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Token 流
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// LLM 客户端 trait：非流式完成与流式完成（返回 Token 流）
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// 流式完成，返回 Token 流
    async fn complete_stream(&self, messages: &[ChatMessage]) -> Result<TokenStream, LlmError>;

    /// 要求结构化 JSON 输出。默认实现只做校验、不做修复；
    /// 支持修复的后端（见 CompatClient）覆盖此方法追加一次修复轮。
    async fn complete_json(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let text = self.complete(messages).await?;
        serde_json::from_str::<serde_json::Value>(text.trim())
            .map_err(|e| LlmError::Malformed(e.to_string()))?;
        Ok(text)
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
