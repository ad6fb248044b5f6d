mod advisor;
mod corpus;
mod index;
mod llm;
mod session;
mod state;
mod supplement;
#[cfg(test)]
mod testing;

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, Level};

use llm::LlmClient;
use session::ChatSession;
use state::{AdvisorConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load env
    let _ = dotenv::dotenv();

    let level = dotenv::var("LOG_LEVEL")
        .ok()
        .and_then(|l| l.parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = AdvisorConfig::from_env()?;

    // Init LLM client (credential required)
    let llm = Arc::new(LlmClient::from_env()?);
    info!("LLM client initialized");

    let state = AppState::init(config, llm).await?;
    info!(
        passages = state.index.corpus().len(),
        dim = state.index.dim(),
        fingerprint = state.index.fingerprint(),
        top_k = state.config.top_k,
        "Advisor ready"
    );

    println!("Investor Q&A (retrieval-augmented). Type a question, or `exit` to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut chat = ChatSession::new();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if matches!(query, "exit" | "quit") {
            break;
        }

        match chat.ask(&state.engine, query).await {
            Ok(response) => {
                let hits: Vec<_> = response
                    .contexts
                    .iter()
                    .map(|r| (r.passage.id, r.distance))
                    .collect();
                debug!(?hits, "retrieved passages");
                println!("{}\n", session::render_response(&response));
            }
            Err(e) => {
                error!("Query failed: {:#}", e);
                println!("{}\n", session::failure_message(&e));
            }
        }
    }

    info!(turns = chat.transcript().len(), "Session ended");
    Ok(())
}
