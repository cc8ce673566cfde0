//! ContractOS: command-line interface.
//!
//! A thin adapter over `contractos-core`/`contractos-store`/`contractos-llm`
//! (spec §6: "Not part of the core's public contract" — any caller, HTTP
//! handler or plugin host, could wrap the same operations this binary
//! dispatches to in `commands.rs`).

pub mod commands;
pub mod config;
pub mod engine;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "contractos")]
#[command(author, version, about = "Legal contract intelligence engine", long_about = None)]
pub struct Cli {
    /// Path to a TOML config file; defaults to ./contractos.toml or the
    /// platform config directory.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output format for command results.
    #[arg(long, global = true, default_value = "json")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload and extract a contract document.
    Upload {
        /// Path to the source file.
        path: String,
        /// Source file format.
        #[arg(long, value_parser = ["docx", "pdf"], default_value = "docx")]
        format: String,
    },
    /// List every indexed contract.
    ListContracts,
    /// Fetch one contract by document id.
    GetContract { document_id: String },
    /// List the facts extracted from a document.
    GetFacts {
        document_id: String,
        #[arg(long)]
        fact_type: Option<String>,
        #[arg(long)]
        entity_type: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List a document's classified clauses, optionally filtered by type.
    GetClauses {
        document_id: String,
        #[arg(long)]
        clause_type: Option<String>,
    },
    /// List a document's resolved bindings.
    GetBindings { document_id: String },
    /// List a document's unfilled mandatory clause-fact slots.
    GetClauseGaps { document_id: String },
    /// Build the fact/clause/binding graph view for a document.
    GetGraph { document_id: String },
    /// Delete a contract and everything it owns.
    DeleteContract { document_id: String },
    /// Delete every contract, workspace, and session.
    ClearAll,
    /// Ask a natural-language question against one or more documents.
    Ask {
        query: String,
        #[arg(long)]
        workspace_id: String,
        /// Document ids to scope the answer to; repeat for multiple.
        #[arg(long = "document", required = true)]
        document_ids: Vec<String>,
        /// Continue an existing session instead of starting a new one.
        #[arg(long)]
        session_id: Option<String>,
    },
    /// List a workspace's past answered sessions, most recent first.
    ListSessions {
        workspace_id: String,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Delete a workspace's session history.
    ClearSessions { workspace_id: String },
    /// Create a new workspace.
    CreateWorkspace { name: String },
    /// Attach an already-uploaded document to a workspace.
    AddDocument { workspace_id: String, document_id: String },
    /// Detach a document from a workspace.
    RemoveDocument { workspace_id: String, document_id: String },
    /// Compare a document's stored hash against the file currently on disk.
    CheckChange { workspace_id: String, document_id: String, path: String },
    /// Run LM-assisted hidden-fact discovery over a document.
    Discover { document_id: String },
}
