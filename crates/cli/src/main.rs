use clap::{Parser, Subcommand};
use concierge::knowledge::{MetadataFilter, RetrievedChunk};

#[derive(Parser)]
#[command(name = "concierge")]
#[command(about = "Concierge customer support agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and default files (config and sample knowledge documents).
    Init {
        /// Config file path (default: CONCIERGE_CONFIG_PATH or ~/.concierge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Chat with the support agent (interactive). /new starts a fresh session, /exit quits.
    Chat {
        /// Config file path (default: CONCIERGE_CONFIG_PATH or ~/.concierge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Session id to use (default: a new one).
        #[arg(long, value_name = "ID")]
        session: Option<String>,
    },

    /// Send a single message and print the reply.
    Ask {
        /// Config file path (default: CONCIERGE_CONFIG_PATH or ~/.concierge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Session id to use (default: a new one).
        #[arg(long, value_name = "ID")]
        session: Option<String>,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,

        /// The user message.
        message: String,
    },

    /// Inspect the knowledge base.
    Knowledge {
        /// Config file path (default: CONCIERGE_CONFIG_PATH or ~/.concierge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        #[command(subcommand)]
        action: KnowledgeAction,
    },
}

#[derive(Subcommand)]
enum KnowledgeAction {
    /// Document and chunk counts of the loaded knowledge directory.
    Stats,

    /// Search the knowledge base with the configured topK and minSimilarity.
    Search {
        query: String,

        /// Only return chunks whose metadata has this value (e.g. source=shipping.md). Repeatable.
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
    },

    /// Copy a .md, .txt, .json or .csv file into the knowledge directory.
    Add {
        file: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("concierge {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config, session }) => {
            if let Err(e) = run_chat(config, session).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask {
            config,
            session,
            json,
            message,
        }) => {
            if let Err(e) = run_ask(config, session, json, message).await {
                log::error!("ask failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Knowledge { config, action }) => {
            if let Err(e) = run_knowledge(config, action).await {
                log::error!("knowledge failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(concierge::config::default_config_path);
    let dir = concierge::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn load_app(config_path: Option<std::path::PathBuf>) -> anyhow::Result<concierge::app::App> {
    let (config, path) = concierge::config::load_config(config_path)?;
    concierge::init::require_initialized(&path, &config)?;
    concierge::app::build(config, path).await
}

fn print_reply(response: &concierge::agent::AgentResponse) {
    println!("< {}", response.text.trim());
    println!("  confidence: {:.2}", response.confidence);
    if !response.sources.is_empty() {
        println!("  sources: {}", response.sources.join(", "));
    }
    log::info!("intent {}", response.intent);
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    session: Option<String>,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let app = load_app(config_path).await?;
    let mut current_session = match session {
        Some(id) => id,
        None => app.agent.sessions().create().await,
    };
    println!("session {} (/new for a fresh one, /exit to quit)", current_session);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }
        if input.eq_ignore_ascii_case("/new") {
            current_session = app.agent.sessions().create().await;
            println!("session {}", current_session);
            continue;
        }

        let response = app.agent.process_message(input, &current_session).await;
        print_reply(&response);
    }

    Ok(())
}

async fn run_ask(
    config_path: Option<std::path::PathBuf>,
    session: Option<String>,
    json: bool,
    message: String,
) -> anyhow::Result<()> {
    let app = load_app(config_path).await?;
    let session_id = match session {
        Some(id) => id,
        None => app.agent.sessions().create().await,
    };
    let response = app.agent.process_message(&message, &session_id).await;
    if json {
        let mut out = serde_json::to_value(&response)?;
        out["sessionId"] = serde_json::Value::String(session_id);
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_reply(&response);
    }
    Ok(())
}

fn print_chunk(i: usize, chunk: &RetrievedChunk) {
    let preview: String = chunk.text.chars().take(160).collect();
    println!("{}. [{:.3}] {}", i + 1, chunk.score, chunk.source_id);
    println!("   {}", preview.replace('\n', " "));
}

/// Parse `key=value` pairs. Values that read as JSON (numbers, booleans) keep that type.
fn parse_filter(pairs: &[String]) -> anyhow::Result<MetadataFilter> {
    let mut filter = MetadataFilter::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("filter {:?} is not KEY=VALUE", pair))?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        filter.insert(key.trim().to_string(), value);
    }
    Ok(filter)
}

fn add_knowledge_file(
    config_path: Option<std::path::PathBuf>,
    file: &std::path::Path,
) -> anyhow::Result<()> {
    use anyhow::Context;

    let (config, path) = concierge::config::load_config(config_path)?;
    let dir = concierge::config::resolve_knowledge_dir(&config, &path);
    let ext = file
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !concierge::knowledge::SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        anyhow::bail!(
            "unsupported file type {:?}; expected one of {:?}",
            ext,
            concierge::knowledge::SUPPORTED_EXTENSIONS
        );
    }
    let name = file
        .file_name()
        .with_context(|| format!("no file name in {}", file.display()))?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating knowledge directory {}", dir.display()))?;
    let dest = dir.join(name);
    std::fs::copy(file, &dest)
        .with_context(|| format!("copying {} to {}", file.display(), dest.display()))?;
    println!("added {}", dest.display());
    Ok(())
}

async fn run_knowledge(
    config_path: Option<std::path::PathBuf>,
    action: KnowledgeAction,
) -> anyhow::Result<()> {
    match action {
        KnowledgeAction::Add { file } => add_knowledge_file(config_path, &file)?,
        KnowledgeAction::Stats => {
            let app = load_app(config_path).await?;
            let stats = app.knowledge.stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        KnowledgeAction::Search { query, filters } => {
            let filter = parse_filter(&filters)?;
            let app = load_app(config_path).await?;
            let agent = &app.config.agent;
            let chunks = app
                .knowledge
                .search_filtered(&query, agent.top_k, agent.min_similarity, &filter)
                .await?;
            if chunks.is_empty() {
                println!("no chunks scored at least {}", agent.min_similarity);
            }
            for (i, chunk) in chunks.iter().enumerate() {
                print_chunk(i, chunk);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_pairs_keep_json_types() {
        let filter = parse_filter(&[
            "source=shipping.md".to_string(),
            "row_number=3".to_string(),
        ])
        .unwrap();
        assert_eq!(filter["source"], "shipping.md");
        assert_eq!(filter["row_number"], 3);
        assert!(parse_filter(&["no-equals".to_string()]).is_err());
    }
}
