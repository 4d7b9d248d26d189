//! LLM 层：客户端抽象与实现（OpenAI 兼容 / 裸线协议兼容端点 / DeepSeek / Mock）

pub mod compat;
pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use compat::CompatClient;
pub use deepseek::{create_deepseek_client, DEEPSEEK_CHAT, DEEPSEEK_REASONER};
pub use mock::{FailingLlmClient, MockLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{ChatMessage, LlmClient, Role, TokenStream};

use crate::config::AppConfig;

/// 按配置与可用 API Key 选择后端：
/// deepseek（有 DEEPSEEK_API_KEY 或 provider=deepseek）> openai > mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let use_deepseek = std::env::var("DEEPSEEK_API_KEY").is_ok()
        || (provider == "deepseek" && std::env::var("OPENAI_API_KEY").is_ok());
    let use_openai = std::env::var("OPENAI_API_KEY").is_ok() && provider != "deepseek";

    if provider == "mock" {
        tracing::info!("Using Mock LLM");
        return Arc::new(MockLlmClient::scripted("[]"));
    }

    if use_deepseek {
        let model = cfg
            .llm
            .deepseek
            .model
            .clone()
            .unwrap_or_else(|| cfg.llm.model.clone());
        tracing::info!("Using DeepSeek LLM ({})", model);
        Arc::new(create_deepseek_client(
            Some(&model),
            cfg.llm.timeouts.request,
        ))
    } else if use_openai {
        let model = cfg
            .llm
            .openai
            .model
            .clone()
            .unwrap_or_else(|| cfg.llm.model.clone());
        tracing::info!("Using OpenAI LLM ({})", model);
        Arc::new(OpenAiClient::new(
            cfg.llm.base_url.as_deref(),
            &model,
            std::env::var("OPENAI_API_KEY").ok().as_deref(),
        ))
    } else {
        tracing::warn!("No API key found, falling back to Mock LLM (empty plan)");
        Arc::new(MockLlmClient::scripted("[]"))
    }
}
