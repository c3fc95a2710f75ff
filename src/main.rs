use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use docs_rag::builder::IndexBuilder;
use docs_rag::config::Config;
use docs_rag::history::HistoryBuffer;
use docs_rag::index::VectorIndex;
use docs_rag::ollama::OllamaClient;
use docs_rag::query::{QueryOrchestrator, RagRequest};
use docs_rag::server::start_server;
use docs_rag::store::DocumentStore;

#[derive(Parser)]
#[command(name = "docs-rag")]
#[command(about = "A retrieval-augmented question answering pipeline over local documents")]
#[command(version)]
struct Cli {
    /// Directory holding the config file, index, metadata, and history
    #[arg(long, default_value = ".", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the vector index from a folder of documents
    Build {
        /// Folder containing .pdf, .txt, and .md documents
        #[arg(long, default_value = "documents")]
        documents: PathBuf,
    },
    /// Start the HTTP server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0:8000")]
        bind: SocketAddr,
    },
    /// Answer a single question from the command line
    Query {
        /// The question to answer
        prompt: String,
        /// Stream the response instead of using the continuation handshake
        #[arg(long)]
        stream: bool,
        /// Token budget per generation call
        #[arg(long, default_value_t = 256)]
        max_tokens: u32,
        /// Generation model, overriding the configured one
        #[arg(long)]
        model: Option<String>,
        /// Upper bound on continuation rounds for one question
        #[arg(long, default_value_t = 8)]
        max_continuations: u32,
    },
    /// Erase the recorded retrieval history
    ClearHistory,
    /// Write or display the configuration file
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.data_dir)?;

    match cli.command {
        Commands::Build { documents } => {
            let client = OllamaClient::new(&config.ollama)?;
            let mut builder = IndexBuilder::new(client, config.chunking.clone());
            builder.build_from_folder(&documents)?;
            builder.persist(&config.index_path(), &config.metadata_path())?;
        }
        Commands::Serve { bind } => {
            let orchestrator = Arc::new(load_orchestrator(&config)?);
            start_server(bind, orchestrator).await?;
        }
        Commands::Query {
            prompt,
            stream,
            max_tokens,
            model,
            max_continuations,
        } => {
            let orchestrator = load_orchestrator(&config)?;
            let model = model.unwrap_or_else(|| config.ollama.generation_model.clone());
            let answer = tokio::task::spawn_blocking(move || {
                run_query(
                    &orchestrator,
                    RagRequest {
                        prompt,
                        model,
                        max_tokens,
                        continuation_token: None,
                        stream,
                    },
                    max_continuations,
                )
            })
            .await
            .context("Query task panicked")??;
            println!("{answer}");
        }
        Commands::ClearHistory => {
            let history =
                HistoryBuffer::new(config.history_path(), config.history.max_bytes)?;
            history.clear()?;
            println!("History cleared");
        }
        Commands::Config { show } => {
            if show {
                let rendered =
                    toml::to_string_pretty(&config).context("Failed to render config")?;
                println!("{rendered}");
            } else {
                config.save()?;
                println!("Wrote {}", config.config_file_path().display());
            }
        }
    }

    Ok(())
}

/// Load the persisted index and metadata and wire up the query pipeline.
fn load_orchestrator(config: &Config) -> Result<QueryOrchestrator<OllamaClient, OllamaClient>> {
    let index_path = config.index_path();
    if !index_path.exists() {
        bail!(
            "No index found at {}; run `docs-rag build` first",
            index_path.display()
        );
    }

    let index = Arc::new(VectorIndex::load(&index_path)?);
    let store = Arc::new(DocumentStore::load(&config.metadata_path())?);
    let client = OllamaClient::new(&config.ollama)?;

    let mut orchestrator = QueryOrchestrator::new(index, store, client.clone(), client)
        .with_top_k(config.retrieval.top_k)
        .with_continuation_slack(config.retrieval.continuation_slack);

    if config.history.enabled {
        let history = HistoryBuffer::new(config.history_path(), config.history.max_bytes)?;
        orchestrator = orchestrator.with_history(history);
    }

    Ok(orchestrator)
}

/// Drive the continuation handshake until the answer is complete or the
/// round cap is reached, concatenating the partial texts.
fn run_query(
    orchestrator: &QueryOrchestrator<OllamaClient, OllamaClient>,
    mut request: RagRequest,
    max_continuations: u32,
) -> Result<String> {
    if request.stream {
        return orchestrator.answer_streaming(&request);
    }

    let mut full_text = String::new();
    for _ in 0..=max_continuations {
        let answer = orchestrator.answer(&request)?;
        full_text.push_str(&answer.text);

        if !answer.needs_continue {
            return Ok(full_text);
        }
        request.continuation_token = answer.continuation_token;
    }

    Ok(full_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["docs-rag", "clear-history"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            matches!(parsed.command, Commands::ClearHistory);
        }
    }

    #[test]
    fn build_command_with_documents_folder() {
        let cli = Cli::try_parse_from(["docs-rag", "build", "--documents", "my-docs"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Build { documents } = parsed.command {
                assert_eq!(documents, PathBuf::from("my-docs"));
            }
        }
    }

    #[test]
    fn query_command_defaults() {
        let cli = Cli::try_parse_from(["docs-rag", "query", "what is chunking?"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Query {
                prompt,
                stream,
                max_tokens,
                model,
                max_continuations,
            } = parsed.command
            {
                assert_eq!(prompt, "what is chunking?");
                assert!(!stream);
                assert_eq!(max_tokens, 256);
                assert_eq!(model, None);
                assert_eq!(max_continuations, 8);
            }
        }
    }

    #[test]
    fn serve_command_with_bind() {
        let cli = Cli::try_parse_from(["docs-rag", "serve", "--bind", "127.0.0.1:9000"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Serve { bind } = parsed.command {
                let expected: SocketAddr = "127.0.0.1:9000".parse().expect("valid address");
                assert_eq!(bind, expected);
            }
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["docs-rag", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn global_data_dir_flag() {
        let cli = Cli::try_parse_from(["docs-rag", "--data-dir", "/tmp/rag", "clear-history"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.data_dir, PathBuf::from("/tmp/rag"));
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["docs-rag", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["docs-rag", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
