// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

mod args;
use anyhow::{Context, Result};
use args::EnvOverrides;
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use stylus::runtime::MaintenanceWorker;
use stylus::{Assistant, EngineEvent, StylusConfig};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Interactive session on stdin. `:report`, `:context`, `:clear` and `:quit` are built in.
    Chat,
    Ask {
        #[arg(long)]
        text: String,
    },
    Generate {
        #[arg(long)]
        description: String,
        #[arg(long)]
        language: Option<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    Teach {
        #[arg(long)]
        input: String,
        #[arg(long)]
        output: String,
        #[arg(long, default_value_t = 1.0)]
        reward: f64,
    },
    /// Groups unlabeled examples by category.
    Discover {
        #[arg(required = true)]
        items: Vec<String>,
    },
    Report {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Parser, Debug, Clone)]
#[command(name = "assistant")]
#[command(about = "Learning chat assistant with template-based code generation.")]
struct Cli {
    #[arg(long, default_value_t = false)]
    debug: bool,
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::Error { detail } => warn!(%detail, "engine error"),
        EngineEvent::Status { text } => info!(%text, "status"),
        EngineEvent::CodeGenerated { language, code } => {
            info!(%language, lines = code.lines().count(), "code generated")
        }
        other => debug!(event = ?other, "engine event"),
    }
}

async fn drain_events(mut rx: UnboundedReceiver<EngineEvent>) {
    while let Some(event) = rx.recv().await {
        log_event(&event);
    }
}

/// Reads lines on a plain OS thread so a blocked read never holds up
/// runtime shutdown. The channel closes at end of input or on a read error.
fn spawn_line_reader<R>(reader: R) -> UnboundedReceiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = unbounded_channel();
    std::thread::spawn(move || {
        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to read stdin");
                    break;
                }
            }
        }
    });
    rx
}

async fn chat(assistant: &Assistant) {
    let mut lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        let line = line.trim();
        match line {
            "" => continue,
            ":quit" | ":exit" => break,
            ":report" => println!("{}", assistant.report()),
            ":context" => println!("{}", assistant.context_summary()),
            ":clear" => assistant.clear_context(),
            message => match assistant.process_input(message) {
                Some(reply) => println!("{reply}"),
                None => warn!("assistant busy, message dropped"),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("info,stylus=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => StylusConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => StylusConfig::default(),
    };
    EnvOverrides::from_env().apply(&mut config);

    let (assistant, report) = Assistant::open(&config)?;
    if let Some(report) = report.filter(|r| !r.is_clean()) {
        warn!(skipped = ?report.skipped, "knowledge partially restored");
    }
    let (tx, rx) = unbounded_channel();
    assistant.subscribe(Arc::new(tx));
    let drain = tokio::spawn(drain_events(rx));

    let mut worker = MaintenanceWorker::new(assistant.engine().clone(), &config.maintenance);
    if let Some(path) = &config.storage.knowledge_path {
        worker = worker.with_knowledge_path(path.clone());
    }
    let worker = worker.spawn();

    match cli.command {
        Commands::Chat => chat(&assistant).await,
        Commands::Ask { text } => match assistant.process_input(&text) {
            Some(reply) => println!("{reply}"),
            None => warn!("assistant busy"),
        },
        Commands::Generate {
            description,
            language,
            json,
        } => {
            let artifact = assistant.generate_code(&description, language.as_deref());
            if json {
                println!("{}", serde_json::to_string_pretty(&artifact)?);
            } else {
                println!("{}", artifact.code);
                if !artifact.is_valid {
                    warn!(language = %artifact.language, "generated code failed the syntax check");
                }
            }
        }
        Commands::Teach {
            input,
            output,
            reward,
        } => {
            assistant.engine().learn(&input, &output, reward);
            let tokens = assistant.learn_from_interaction(&input, &output);
            info!(tokens, reward, "interaction taught");
        }
        Commands::Discover { items } => {
            for category in assistant.engine().unsupervised_learn(&items) {
                println!("{category}");
            }
        }
        Commands::Report { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&assistant.engine().stats())?);
            } else {
                println!("{}", assistant.report());
            }
        }
    }

    let summary = worker.shutdown().await?;
    debug!(?summary, "maintenance finished");
    drop(assistant);
    drain.await?;
    Ok(())
}
