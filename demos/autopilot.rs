//! Scripted autopilot run against a live browser.
//!
//! Demonstrates:
//! - Connecting to a DevTools endpoint
//! - Starting a resilient protocol session
//! - Replaying a scripted policy through the agent loop
//! - Printing companion messages as they arrive
//!
//! Start the browser with `--remote-debugging-port=9222`, then:
//!
//! Usage:
//!   cargo run --example autopilot -- ws://127.0.0.1:9222/devtools/browser/<id>
//!   cargo run --example autopilot -- <endpoint> --debug
//!   cargo run --example autopilot -- <endpoint> --copilot

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::json;
use tab_autopilot::agent::COMPUTER_TOOL;
use tab_autopilot::{
    ActionExecutor, Agent, AgentConfig, CdpBackend, ChannelCompanion, Companion,
    CompanionMessage, ContentBlock, DebuggerBackend, Error, Mode, ProtocolSession, Result, ScriptedPolicy,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    endpoint: Option<String>,
    debug: bool,
    copilot: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self {
            endpoint: args.iter().find(|a| !a.starts_with("--")).cloned(),
            debug: args.iter().any(|a| a == "--debug"),
            copilot: args.iter().any(|a| a == "--copilot"),
        }
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "tab_autopilot=debug"
    } else {
        "tab_autopilot=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Autopilot ===\n");

    let endpoint = args
        .endpoint
        .ok_or_else(|| Error::config("Missing DevTools endpoint argument"))?;
    let mode = if args.copilot {
        Mode::Copilot
    } else {
        Mode::Autopilot
    };

    // ========================================================================
    // Session
    // ========================================================================

    println!("[1] Connecting to {endpoint}...");

    let config = AgentConfig::builder().endpoint(endpoint).mode(mode).build()?;
    let url = config
        .endpoint
        .clone()
        .ok_or_else(|| Error::config("Endpoint required"))?;

    let backend = Arc::new(CdpBackend::connect(&url).await?);
    let session = Arc::new(ProtocolSession::new(
        Arc::clone(&backend) as Arc<dyn DebuggerBackend>,
        config.session.clone(),
    ));
    let events = session.start();

    println!("    ✓ Connected\n");

    // ========================================================================
    // Companion
    // ========================================================================

    let (companion, mut messages) = ChannelCompanion::new();
    let companion = Arc::new(companion);
    let printer = {
        let companion = Arc::clone(&companion);
        tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                match message {
                    CompanionMessage::AiResponse { ai_message } => println!("    AI: {ai_message}"),
                    CompanionMessage::ActionResponse { title } => println!("    {title}"),
                    CompanionMessage::CopilotCue {
                        cue_id,
                        action_name,
                        payload,
                    } => {
                        println!("    [copilot] please perform {action_name} {payload}");
                        companion.acknowledge(cue_id);
                    }
                    CompanionMessage::FinishRun => println!("    ✓ Run finished"),
                    CompanionMessage::ErrorNotice { message } => println!("    ✗ {message}"),
                    _ => {}
                }
            }
        })
    };

    // ========================================================================
    // Run
    // ========================================================================

    println!("[2] Running scripted policy ({mode:?})...");

    let policy = ScriptedPolicy::new([
        vec![
            ContentBlock::text("Let me look at the page first."),
            ContentBlock::tool_use("toolu_1", COMPUTER_TOOL, json!({"action": "screenshot"})),
        ],
        vec![ContentBlock::tool_use(
            "toolu_2",
            COMPUTER_TOOL,
            json!({"action": "scroll", "coordinate": [512, 384], "scroll_direction": "down", "scroll_amount": 3}),
        )],
        vec![ContentBlock::tool_use(
            "toolu_3",
            COMPUTER_TOOL,
            json!({"action": "key", "text": "ctrl+home"}),
        )],
        vec![ContentBlock::text("Scrolled down and back to the top.")],
    ]);

    let executor = ActionExecutor::new(
        Arc::clone(&session),
        Arc::clone(&companion) as Arc<dyn Companion>,
        &config,
    );
    let agent = Agent::new(Arc::new(policy), executor);

    let token = CancellationToken::new();
    let outcome = agent.run("Scroll around the page", &token).await?;

    println!("\n[3] Outcome: {outcome:?}");
    println!("    Trajectory: {} messages", agent.trajectory().len());
    println!("    Stats: {:?}", session.stats());

    session.cleanup().await;
    events.abort();
    backend.shutdown();
    drop(agent);
    printer.abort();

    Ok(())
}
