//! End-to-end tests for the CLI's command layer: upload through extraction
//! and classification, ask through the document agent, workspace and
//! change-detection bookkeeping.

use std::sync::Arc;

use contractos_cli::commands;
use contractos_cli::engine::Engine;
use contractos_core::clause::ClauseType;
use contractos_core::config::Config;
use contractos_core::contract::FileFormat;
use contractos_llm::provider::MockProvider;

const SAMPLE_CONTRACT: &str = "\
This Master Services Agreement is entered into between Alpha Corp, hereinafter referred to as \"Buyer\", and Beta Services Ltd, hereinafter referred to as \"Vendor\".

1. Termination

Either party may terminate this Agreement upon sixty (60) days written notice.

2. Payment

Client shall pay Vendor $5,000.00 within fifteen (15) days of invoice.

3. Confidentiality

Each party shall keep the other's proprietary information confidential.
";

fn test_engine() -> (tempfile::TempDir, Engine) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.path = dir.path().join("test.db").to_string_lossy().into_owned();
    let engine = Engine::open(config).unwrap();
    (dir, engine)
}

/// An engine whose provider answers every question with a scripted,
/// schema-conforming reply, instead of the unscripted `MockProvider` default
/// (which returns free text no real deployment's LM would, and which the
/// agent correctly treats as an invalid response rather than guessing).
fn test_engine_with_scripted_answer(answer_text: &str) -> (tempfile::TempDir, Engine) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.storage.path = dir.path().join("test.db").to_string_lossy().into_owned();
    let reply = serde_json::json!({
        "answer_type": "fact",
        "answer_text": answer_text,
        "cited_fact_ids": [],
        "cited_binding_ids": [],
        "reasoning_summary": "Cited directly from the retrieved clause text.",
    });
    let provider = MockProvider::new().with_structured_response("Question:", reply);
    let engine = Engine::with_provider(config, Arc::new(provider)).unwrap();
    (dir, engine)
}

fn write_sample(dir: &tempfile::TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, text).unwrap();
    path
}

#[tokio::test]
async fn upload_extracts_and_classifies_clauses() {
    let (dir, engine) = test_engine();
    let path = write_sample(&dir, "contract.docx", SAMPLE_CONTRACT);

    let contract = commands::upload(&engine, &path, FileFormat::Docx).await.unwrap();
    assert!(!contract.document_id.is_empty());
    assert_eq!(contract.file_format, FileFormat::Docx);

    let clauses = commands::get_clauses(&engine, &contract.document_id, None).unwrap();
    assert!(!clauses.is_empty());
    assert!(clauses.iter().any(|c| c.clause_type == ClauseType::Termination));
    assert!(clauses.iter().any(|c| c.clause_type == ClauseType::Payment));

    let facts = commands::get_facts(&engine, &contract.document_id, commands::FactQuery::default()).unwrap();
    assert!(!facts.is_empty());
}

#[tokio::test]
async fn upload_is_deterministic_in_document_id() {
    let (dir, engine) = test_engine();
    let path = write_sample(&dir, "contract.docx", SAMPLE_CONTRACT);

    let first = commands::upload(&engine, &path, FileFormat::Docx).await.unwrap();
    commands::delete_contract(&engine, &first.document_id).unwrap();
    let second = commands::upload(&engine, &path, FileFormat::Docx).await.unwrap();

    assert_eq!(first.document_id, second.document_id, "same bytes must hash to the same document id");
}

#[tokio::test]
async fn ask_against_uploaded_document_returns_a_completed_session() {
    let (dir, engine) = test_engine_with_scripted_answer("Notice period is sixty days.");
    let path = write_sample(&dir, "contract.docx", SAMPLE_CONTRACT);
    let contract = commands::upload(&engine, &path, FileFormat::Docx).await.unwrap();

    let workspace = commands::create_workspace(&engine, "Acme Deal").unwrap();
    commands::add_document(&engine, &workspace.workspace_id, &contract.document_id).unwrap();

    let session = commands::ask(
        &engine,
        "What is the termination notice period?",
        &workspace.workspace_id,
        vec![contract.document_id.clone()],
        None,
        Vec::new(),
    )
    .await
    .unwrap();

    let result = session.result.as_ref().expect("a completed session carries a result");
    assert_eq!(result.answer_text, "Notice period is sixty days.");
    assert_eq!(session.workspace_id, workspace.workspace_id);

    let sessions = commands::list_sessions(&engine, &workspace.workspace_id, 10).unwrap();
    assert!(sessions.iter().any(|s| s.session_id == session.session_id));
}

#[tokio::test]
async fn ask_rejects_an_empty_document_scope() {
    let (_dir, engine) = test_engine();
    let workspace = commands::create_workspace(&engine, "Empty Deal").unwrap();

    let result = commands::ask(&engine, "Any question", &workspace.workspace_id, Vec::new(), None, Vec::new()).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn check_change_detects_a_modified_file() {
    let (dir, engine) = test_engine();
    let path = write_sample(&dir, "contract.docx", SAMPLE_CONTRACT);
    let contract = commands::upload(&engine, &path, FileFormat::Docx).await.unwrap();
    let workspace = commands::create_workspace(&engine, "Acme Deal").unwrap();
    commands::add_document(&engine, &workspace.workspace_id, &contract.document_id).unwrap();

    let unchanged = commands::check_change(&engine, &workspace.workspace_id, &contract.document_id, &path).unwrap();
    assert!(!unchanged.changed);

    std::fs::write(&path, format!("{SAMPLE_CONTRACT}\nAmendment: the fee is now $6,000.")).unwrap();
    let changed = commands::check_change(&engine, &workspace.workspace_id, &contract.document_id, &path).unwrap();
    assert!(changed.changed);
    assert_ne!(changed.current_hash, changed.stored_hash);
}

#[tokio::test]
async fn delete_contract_removes_its_clauses_and_facts() {
    let (dir, engine) = test_engine();
    let path = write_sample(&dir, "contract.docx", SAMPLE_CONTRACT);
    let contract = commands::upload(&engine, &path, FileFormat::Docx).await.unwrap();

    commands::delete_contract(&engine, &contract.document_id).unwrap();

    assert!(commands::get_contract(&engine, &contract.document_id).is_err());
    assert!(commands::get_clauses(&engine, &contract.document_id, None).unwrap().is_empty());
}

#[test]
fn parse_clause_type_falls_back_to_custom_for_unknown_names() {
    assert_eq!(commands::parse_clause_type("termination"), ClauseType::Termination);
    assert_eq!(commands::parse_clause_type("arbitration"), ClauseType::Custom("arbitration".to_string()));
}

#[test]
fn parse_file_format_rejects_unknown_extensions() {
    assert!(commands::parse_file_format("docx").is_ok());
    assert!(commands::parse_file_format("txt").is_err());
}

