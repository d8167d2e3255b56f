//! Weather Tool Example
//!
//! Asks about the weather, lets the model call a local `get_current_weather`
//! tool, and streams the continued answer. A second turn is cancelled after a
//! few seconds to show that history stays consistent.
//!
//! Note: This example needs an Ollama server (default http://localhost:11434,
//! override with OLLAMA_HOST) and a tool-capable model (override with
//! OLLAMA_MODEL).
//!
//! Run with `RUST_LOG=debug` to see request and tool logs.

use futures::StreamExt;
use ollama_chat::{Chat, ChatOptions, Error, Hooks, get_model, tool};
use serde_json::json;
use std::io::Write;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let weather = tool("get_current_weather", "Get the current weather for a location")
        .param_desc("location", "string", "The location, e.g. San Francisco, CA")
        .enum_param("format", &["celsius", "fahrenheit"], "Temperature unit")
        .build_sync(|args| {
            let location = args.str("location")?;
            let reading = match args.str("format")? {
                "fahrenheit" => "70 °F",
                _ => "21 °C",
            };
            Ok(json!(format!("{} in {}", reading, location)))
        });

    let hooks = Hooks::new()
        .add_thinking(|event| eprint!("\x1b[2m{}\x1b[0m", event.text))
        .add_tool_call(|event| {
            println!("\n[calling {} with {:?}]", event.tool_call.name(), event.tool_call.arguments())
        })
        .add_tool_result(|event| println!("[{}]\n", event.text.replace('\n', " ")));

    let model = get_model(Some("llama3.1"), true).unwrap_or_else(|| "llama3.1".to_string());
    let options = ChatOptions::builder()
        .model(model)
        .tool(weather)
        .hooks(hooks)
        .temperature(0.2)
        .build()?;

    let mut chat = Chat::new(options)?;

    // ------------------------------------------------------------------------
    // Turn 1: tool call and continuation inside a single send
    // ------------------------------------------------------------------------
    println!("> How is the weather in LA?");
    let mut tokens = chat.send("How is the weather in LA?", CancellationToken::new());
    while let Some(token) = tokens.next().await {
        print!("{}", token?);
        std::io::stdout().flush()?;
    }
    drop(tokens);
    println!("\n\nHistory: {} messages", chat.history().len());
    if let Some(stats) = chat.last_stats() {
        println!(
            "Last reply: {:?} prompt tokens, {:?} completion tokens",
            stats.prompt_eval_count, stats.eval_count
        );
    }

    // ------------------------------------------------------------------------
    // Turn 2: cancelled after three seconds
    // ------------------------------------------------------------------------
    let before = chat.history().len();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        trigger.cancel();
    });

    println!("\n> Write a long essay about the climate of California.");
    let mut tokens = chat.send("Write a long essay about the climate of California.", cancel);
    while let Some(token) = tokens.next().await {
        match token {
            Ok(text) => {
                print!("{}", text);
                std::io::stdout().flush()?;
            }
            Err(Error::Cancelled) => {
                println!("\n\n[cancelled]");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }
    drop(tokens);

    println!(
        "History before: {}, after: {} messages",
        before,
        chat.history().len()
    );

    Ok(())
}
