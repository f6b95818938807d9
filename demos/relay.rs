//! Interactive relay.
//!
//! Connects to the annotation server and forwards every line typed on stdin
//! as a selection. Replies from the server are printed as they arrive.
//!
//! Run with: cargo run --example relay -- [--debug] [--url ws://localhost:8000] [--color blue]

// ============================================================================
// Imports
// ============================================================================

use annotation_relay::{ConnectionManager, SelectionForwarder};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone)]
struct Args {
    debug: bool,
    url: Option<String>,
    color: Option<String>,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            url: value_of("--url"),
            color: value_of("--color"),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

fn init_logging(debug: bool) {
    let filter = if debug {
        "annotation_relay=debug"
    } else {
        "annotation_relay=info"
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
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let mut builder = ConnectionManager::builder();
    if let Some(url) = args.url {
        builder = builder.url(url);
    }
    let manager = builder.start()?;

    manager.set_message_handler(Box::new(|value: serde_json::Value| {
        println!("<- {value}");
    }));

    let mut forwarder = SelectionForwarder::new(manager.clone());
    if let Some(color) = args.color {
        forwarder = forwarder.with_color(color);
    }

    println!("Relaying to {} - type a selection and press enter", manager.url());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match forwarder.on_selection(&line).await {
            Ok(Some(response)) => println!("-> {}", serde_json::to_string(&response)?),
            Ok(None) => {}
            Err(e) => println!("!! {e} (state: {})", manager.state()),
        }
    }

    manager.shutdown();
    Ok(())
}
