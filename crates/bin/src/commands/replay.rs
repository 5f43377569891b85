//! Replay command - applies a log of operation records to a fresh document.

use std::{fs, path::Path, sync::Arc};

use serde::Serialize;
use sharedoc::{
    Applied, DocumentConfig, DocumentHandle, FixedClock, ops::OperationRecord,
    participants::{ParticipantId, ReplicaId},
};

use crate::cli::ReplayArgs;
use crate::output::{OutputFormat, print_json, print_pretty, print_table};

/// Outcome of one replayed record.
#[derive(Debug, Serialize)]
struct RecordResult {
    author: String,
    replica: String,
    seq: u64,
    operation: String,
    result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Read a JSON array of operation records.
pub fn load_records(path: &Path) -> Result<Vec<OperationRecord>, Box<dyn std::error::Error>> {
    let json = fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(serde_json::from_str(&json)?)
}

/// Run the replay command
pub fn run(
    args: &ReplayArgs,
    config: DocumentConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = load_records(&args.ops)?;
    let me = ParticipantId::parse(&args.participant)?;
    let replica = ReplicaId::parse(&args.replica)?;
    let mut doc = DocumentHandle::create_with_replica(
        args.document.as_str(),
        me,
        replica,
        config,
        Arc::new(FixedClock::default()),
    );
    tracing::info!(records = records.len(), path = %args.ops.display(), "replaying operation log");

    let mut results = Vec::with_capacity(records.len());
    for record in records {
        let author = record.author.to_string();
        let replica = record.replica.to_string();
        let seq = record.seq;
        let operation = record.op.to_string();
        let (result, error) = match doc.apply_remote(record) {
            Ok(Applied::Applied { events }) => (format!("applied ({events} events)"), None),
            Ok(Applied::ConcurrentNoOp { reason }) => (format!("no-op ({reason:?})"), None),
            Ok(Applied::Duplicate) => ("duplicate".to_string(), None),
            Err(e) => {
                tracing::warn!(%author, %replica, seq, error = %e, "record rejected");
                ("rejected".to_string(), Some(e.to_string()))
            }
        };
        results.push(RecordResult {
            author,
            replica,
            seq,
            operation,
            result,
            error,
        });
    }

    let snapshot = doc.to_plain_value()?.to_json();
    let participants: Vec<String> = doc.participants()?.iter().map(ToString::to_string).collect();

    match format {
        OutputFormat::Human => {
            let rows: Vec<Vec<String>> = results
                .iter()
                .map(|r| {
                    let result = match &r.error {
                        Some(error) => format!("{}: {error}", r.result),
                        None => r.result.clone(),
                    };
                    vec![
                        r.author.clone(),
                        r.replica.clone(),
                        r.seq.to_string(),
                        r.operation.clone(),
                        result,
                    ]
                })
                .collect();
            if rows.is_empty() {
                println!("No records.");
            } else {
                print_table(&["AUTHOR", "REPLICA", "SEQ", "OPERATION", "RESULT"], &rows);
            }
            println!();
            println!("Participants: {}", participants.join(", "));
            print_pretty(&snapshot)?;
        }
        OutputFormat::Json => {
            let value = serde_json::json!({
                "records": results,
                "participants": participants,
                "document": snapshot,
            });
            print_json(&value)?;
        }
    }

    Ok(())
}
