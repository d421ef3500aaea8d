mod config;
mod server;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use knowledge::{BuildReport, ResetReport, reset_knowledge_base};
use query::{KnowledgeStore, KnowledgeTools, TOOLS};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "kb")]
#[command(author, version, about = "Build and query a markdown knowledge base", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Knowledge base directory (overrides MARKDOWN_FILES_DIR)
    #[arg(long, global = true)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the raw input, extract entities and write the markdown files
    Build {
        /// Raw input directory (overrides RAW_INPUT_DIR)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Print the build report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete generated markdown files, keeping templates
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Run one of the knowledge tools
    Query {
        #[command(subcommand)]
        tool: QueryCommand,
    },

    /// Serve the knowledge tools over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
    },

    /// List the available tools
    Tools,
}

#[derive(Subcommand)]
enum QueryCommand {
    /// list_knowledge_categories
    Categories,
    /// query_knowledge_category
    Category { category: String },
    /// search_knowledge
    Search {
        query: String,
        #[arg(long)]
        category: Option<String>,
    },
    /// query_temporal_knowledge
    Period { time_period: String },
    /// find_entity_knowledge
    Entity { entity_type: String, entity_name: String },
    /// find_related_entities
    Related { entity_name: String },
    /// get_person_network
    Network { person_name: String },
    /// get_knowledge_summary
    Summary,
    /// list_markdown_files
    Files,
    /// read_markdown_file
    Read { filename: String },
    /// create_markdown_file
    Create { filename: String, content: String },
    /// update_markdown_file
    Update { filename: String, content: String },
    /// append_to_markdown_file
    Append { filename: String, content: String },
    /// delete_markdown_file
    Delete { filename: String },
    /// search_markdown_files
    Grep { query: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = AppConfig::from_env()?;
    if let Some(output) = cli.output {
        config.paths.markdown_dir = output;
    }

    match cli.command {
        Commands::Build { input, json } => {
            if let Some(input) = input {
                config.paths.raw_input_dir = input;
            }
            let report = run_build(&config).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_build_report(&report);
            }
        }
        Commands::Reset { yes } => {
            let dir = &config.paths.markdown_dir;
            if !yes && !confirm(dir)? {
                println!("Reset cancelled");
                return Ok(());
            }
            let report = reset_knowledge_base(dir)?;
            print_reset_report(&report);
        }
        Commands::Query { tool } => {
            let tools = KnowledgeTools::new(KnowledgeStore::new(&config.paths.markdown_dir));
            println!("{}", run_query(&tools, tool));
        }
        Commands::Serve { addr } => {
            let tools = KnowledgeTools::new(KnowledgeStore::new(&config.paths.markdown_dir));
            server::serve(tools, &addr).await?;
        }
        Commands::Tools => {
            for tool in TOOLS {
                let params: Vec<String> = tool
                    .parameters
                    .iter()
                    .map(|p| if p.required { p.name.to_string() } else { format!("[{}]", p.name) })
                    .collect();
                println!("{}({})\n    {}", tool.name, params.join(", "), tool.description);
            }
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
}

async fn run_build(config: &AppConfig) -> Result<BuildReport> {
    let extractor = config.extractor().context("Failed to create model client")?;
    info!(
        provider = ?config.llm.provider,
        input = ?config.paths.raw_input_dir,
        output = ?config.paths.markdown_dir,
        "Starting knowledge build"
    );

    knowledge::build(
        &config.input_layout(),
        &config.file_reader(),
        &extractor,
        &config.aggregation_policy(),
        &config.renderer(),
        &config.build_options(),
    )
    .await
}

fn run_query(tools: &KnowledgeTools, command: QueryCommand) -> String {
    match command {
        QueryCommand::Categories => tools.list_knowledge_categories(),
        QueryCommand::Category { category } => tools.query_knowledge_category(&category),
        QueryCommand::Search { query, category } => tools.search_knowledge(&query, category.as_deref()),
        QueryCommand::Period { time_period } => tools.query_temporal_knowledge(&time_period),
        QueryCommand::Entity {
            entity_type,
            entity_name,
        } => tools.find_entity_knowledge(&entity_type, &entity_name),
        QueryCommand::Related { entity_name } => tools.find_related_entities(&entity_name),
        QueryCommand::Network { person_name } => tools.get_person_network(&person_name),
        QueryCommand::Summary => tools.get_knowledge_summary(),
        QueryCommand::Files => tools.list_markdown_files(),
        QueryCommand::Read { filename } => tools.read_markdown_file(&filename),
        QueryCommand::Create { filename, content } => tools.create_markdown_file(&filename, &content),
        QueryCommand::Update { filename, content } => tools.update_markdown_file(&filename, &content),
        QueryCommand::Append { filename, content } => tools.append_to_markdown_file(&filename, &content),
        QueryCommand::Delete { filename } => tools.delete_markdown_file(&filename),
        QueryCommand::Grep { query } => tools.search_markdown_files(&query),
    }
}

fn confirm(dir: &std::path::Path) -> Result<bool> {
    println!("This will delete all generated markdown files in {}.", dir.display());
    println!("Templates and folder structure will be preserved.");
    print!("\nContinue? (yes/no): ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "yes" | "y"))
}

fn print_build_report(report: &BuildReport) {
    println!("Knowledge base build complete ({})", report.started_at);
    println!("  Documents discovered: {}", report.discovered);
    for (kind, count) in &report.processed {
        println!("    {}: {}", kind.label(), count);
    }
    if !report.skipped.is_empty() {
        println!("  Skipped: {}", report.skipped.len());
        for skipped in &report.skipped {
            println!("    {} ({})", skipped.path.display(), skipped.reason);
        }
    }
    println!(
        "  AI extractions: {} ok, {} partial, {} failed",
        report.extraction.ai_extractions, report.extraction.partial_extractions, report.extraction.ai_errors
    );
    println!("  People: {}", report.people);
    println!("  Organizations: {}", report.organizations);
    println!("  Technologies: {}", report.technologies);
    println!("  Topics: {}", report.topics);
    println!("  Meetings: {}", report.meetings);
    println!("  Relationships: {}", report.relationships);
    println!("  Files written: {}", report.rendered.total());
    if report.rendered.failed > 0 {
        println!("  Files failed: {} (see log)", report.rendered.failed);
    }
}

fn print_reset_report(report: &ResetReport) {
    for (dir, count) in &report.per_directory {
        if *count > 0 {
            println!("  Cleaned {}: {} files", dir, count);
        }
    }
    if report.index_files > 0 {
        println!("  Removed {} index files", report.index_files);
    }
    println!("Reset complete: deleted {} generated files", report.deleted());
}
