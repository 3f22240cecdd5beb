use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use webnav_agent::{BrowserTools, ConversationLog, LoopDetector, TurnRunner};
use webnav_browser::{ToolContext, ToolRegistry};
use webnav_core::{Config, Paths, ToolCallRequest};

use super::browser::BrowserSession;

/// Execute tool call turns against a fresh browser session.
pub async fn run(url: Option<&str>, calls: &str, session: &str) -> anyhow::Result<()> {
    let turns = parse_turns(&read_calls(calls)?)?;
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;

    let browser = BrowserSession::start(&config, &paths, session).await?;
    let result = run_turns(&browser, &config, &paths, url, session, turns).await;
    browser.close().await;
    result
}

async fn run_turns(
    browser: &BrowserSession,
    config: &Config,
    paths: &Paths,
    url: Option<&str>,
    session: &str,
    turns: Vec<Vec<ToolCallRequest>>,
) -> anyhow::Result<()> {
    if let Some(url) = url {
        println!("{}", browser.executor.open_url(url, Duration::from_secs(10)).await?);
    }

    let tools = BrowserTools::new(
        ToolRegistry::with_defaults(),
        ToolContext::new(browser.executor.clone()),
    );
    let log = ConversationLog::open(paths.conversation_log(session))?;
    let mut runner = TurnRunner::new(Arc::new(tools), LoopDetector::new(config.agent.loop_window)).with_log(log);

    let total = turns.len();
    for (index, calls) in turns.iter().enumerate() {
        println!();
        println!("── Turn {}/{} ──", index + 1, total);
        let outcome = runner.run_turn(calls).await?;
        for response in &outcome.responses {
            let marker = if response.skipped { "⏭" } else { "✓" };
            println!("{} {} [{}]", marker, response.name, response.tool_call_id);
            println!("  {}", response.content.replace('\n', "\n  "));
        }
        if outcome.stuck {
            warn!("Loop detected, remaining turns are not executed");
            println!();
            println!("⚠ Stopped: the same call keeps returning the same response.");
            break;
        }
    }

    if let Some(path) = runner.log().path() {
        println!();
        println!("Conversation log: {}", path.display());
    }
    Ok(())
}

fn read_calls(arg: &str) -> anyhow::Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read calls file {}: {}", path, e)),
        None => Ok(arg.to_string()),
    }
}

/// Accepts a single call object, one turn (array of calls) or several turns
/// (array of arrays). Calls without an id get a generated one.
pub fn parse_turns(input: &str) -> anyhow::Result<Vec<Vec<ToolCallRequest>>> {
    let value: Value = serde_json::from_str(input)
        .map_err(|e| anyhow::anyhow!("Failed to parse JSON calls: {}\nInput: {}", e, input))?;

    let turns = match value {
        Value::Array(items) if items.iter().all(Value::is_array) && !items.is_empty() => items,
        Value::Array(items) => vec![Value::Array(items)],
        call @ Value::Object(_) => vec![Value::Array(vec![call])],
        other => anyhow::bail!("Expected a tool call object or array, got: {}", other),
    };

    turns
        .into_iter()
        .map(|turn| -> anyhow::Result<Vec<ToolCallRequest>> {
            let calls: Vec<ToolCallRequest> = serde_json::from_value(turn)?;
            calls
                .into_iter()
                .map(|mut call| -> anyhow::Result<ToolCallRequest> {
                    if call.name.is_empty() {
                        anyhow::bail!("Tool call without a name");
                    }
                    if call.id.is_empty() {
                        call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
                    }
                    Ok(call)
                })
                .collect()
        })
        .collect()
}
