//! Tabula - Rust 智能表格引擎
//!
//! 入口：初始化日志与配置，把命令行目标交给编排器跑一轮，
//! 过程 Token 即时打印，结束后输出工作簿 JSON 投影。

use anyhow::Context;
use tabula::agent::{AgentEvent, AgentHints, Orchestrator};
use tabula::config::load_config;
use tabula::llm::create_llm_from_config;
use tabula::model::SheetModel;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tabula::observability::init();

    let goal: String = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    anyhow::ensure!(!goal.is_empty(), "usage: tabula <goal>");

    let cfg = load_config(None).context("Failed to load config")?;
    let llm = create_llm_from_config(&cfg);

    let mut model = SheetModel::new();
    let orchestrator = Orchestrator::new(llm.clone(), cfg.agent.clone());

    let (tx, mut rx) = mpsc::channel::<AgentEvent>(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                AgentEvent::Token { text } => print!("{}", text),
                AgentEvent::Status { text } => eprintln!("[status] {}", text),
                AgentEvent::Error { text } => eprintln!("[error] {}", text),
                AgentEvent::Plan { steps } => {
                    eprintln!("\n[plan] {} step(s)", steps.len());
                }
                _ => {}
            }
        }
    });

    let outcome = orchestrator
        .run(&mut model, &goal, &AgentHints::default(), &tx)
        .await;
    drop(tx);
    printer.await.ok();

    let outcome = outcome.context("Agent run failed")?;
    eprintln!(
        "executed {} of {} step(s)",
        outcome.executed,
        outcome.steps.len()
    );
    let (prompt_tokens, completion_tokens, total_tokens) = llm.token_usage();
    if total_tokens > 0 {
        eprintln!(
            "token usage: {} prompt + {} completion = {}",
            prompt_tokens, completion_tokens, total_tokens
        );
    }
    println!("{}", serde_json::to_string_pretty(&model.to_json())?);

    Ok(())
}
