//! ContractOS CLI entry point: parse arguments, load configuration, open the
//! engine, dispatch to `commands`, print the result.

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use contractos_cli::{commands, config, engine::Engine, Cli, Commands, OutputFormat};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let config = config::load_config(cli.config.as_deref().map(Path::new))?;
    let engine = Engine::open(config)?;

    match run(&engine, cli.command).await {
        Ok(value) => {
            print_value(&value, cli.format);
            Ok(())
        }
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            Err(err)
        }
    }
}

fn print_value(value: &serde_json::Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value).expect("serializable result")),
        OutputFormat::Text => println!("{value}"),
    }
}

async fn run(engine: &Engine, command: Commands) -> Result<serde_json::Value> {
    Ok(match command {
        Commands::Upload { path, format } => {
            let format = commands::parse_file_format(&format)?;
            let contract = commands::upload(engine, Path::new(&path), format).await?;
            serde_json::to_value(contract)?
        }
        Commands::ListContracts => serde_json::to_value(commands::list_contracts(engine)?)?,
        Commands::GetContract { document_id } => serde_json::to_value(commands::get_contract(engine, &document_id)?)?,
        Commands::GetFacts { document_id, fact_type, entity_type, offset, limit } => {
            let query = commands::FactQuery {
                fact_type: fact_type.map(|s| commands::parse_fact_type(&s)).transpose()?,
                entity_type: entity_type.map(|s| commands::parse_entity_type(&s)).transpose()?,
                offset,
                limit,
            };
            serde_json::to_value(commands::get_facts(engine, &document_id, query)?)?
        }
        Commands::GetClauses { document_id, clause_type } => {
            let clause_type = clause_type.map(|s| commands::parse_clause_type(&s));
            serde_json::to_value(commands::get_clauses(engine, &document_id, clause_type)?)?
        }
        Commands::GetBindings { document_id } => serde_json::to_value(commands::get_bindings(engine, &document_id)?)?,
        Commands::GetClauseGaps { document_id } => {
            serde_json::to_value(commands::get_clause_gaps(engine, &document_id)?)?
        }
        Commands::GetGraph { document_id } => serde_json::to_value(commands::get_graph(engine, &document_id)?)?,
        Commands::DeleteContract { document_id } => {
            commands::delete_contract(engine, &document_id)?;
            serde_json::json!({ "deleted": document_id })
        }
        Commands::ClearAll => {
            commands::clear_all(engine)?;
            serde_json::json!({ "cleared": true })
        }
        Commands::Ask { query, workspace_id, document_ids, session_id } => {
            let session = commands::ask(engine, &query, &workspace_id, document_ids, session_id, Vec::new()).await?;
            serde_json::to_value(session)?
        }
        Commands::ListSessions { workspace_id, limit } => {
            serde_json::to_value(commands::list_sessions(engine, &workspace_id, limit)?)?
        }
        Commands::ClearSessions { workspace_id } => {
            commands::clear_sessions(engine, &workspace_id)?;
            serde_json::json!({ "cleared": workspace_id })
        }
        Commands::CreateWorkspace { name } => serde_json::to_value(commands::create_workspace(engine, &name)?)?,
        Commands::AddDocument { workspace_id, document_id } => {
            commands::add_document(engine, &workspace_id, &document_id)?;
            serde_json::json!({ "added": document_id })
        }
        Commands::RemoveDocument { workspace_id, document_id } => {
            commands::remove_document(engine, &workspace_id, &document_id)?;
            serde_json::json!({ "removed": document_id })
        }
        Commands::CheckChange { workspace_id, document_id, path } => {
            serde_json::to_value(commands::check_change(engine, &workspace_id, &document_id, Path::new(&path))?)?
        }
        Commands::Discover { document_id } => serde_json::to_value(commands::discover(engine, &document_id).await?)?,
    })
}
