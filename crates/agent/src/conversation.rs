use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use webnav_core::{Result, ToolCallRecord, ToolCallRequest};

use crate::dispatcher::{SequentialToolDispatcher, ToolCallResponse, ToolExecutor};
use crate::loop_detector::LoopDetector;

/// Append-only history of every tool call and the text it returned.
///
/// When backed by a file each record is also appended there as one JSON line.
#[derive(Debug, Default)]
pub struct ConversationLog {
    records: Vec<ToolCallRecord>,
    turns: usize,
    file: Option<PathBuf>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume the history stored at `path`. Unreadable lines are skipped.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut records = Vec::new();

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<ToolCallRecord>(&line) {
                    Ok(record) => records.push(record),
                    Err(e) => debug!(error = %e, "Failed to parse conversation line, skipping"),
                }
            }
        }

        let turns = records.iter().map(|r| r.turn_index + 1).max().unwrap_or(0);
        Ok(Self {
            records,
            turns,
            file: Some(path),
        })
    }

    pub fn records(&self) -> &[ToolCallRecord] {
        &self.records
    }

    pub fn turn_count(&self) -> usize {
        self.turns
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Record one finished turn. Responses pair with calls by position.
    pub fn record_turn(&mut self, calls: &[ToolCallRequest], responses: &[ToolCallResponse]) -> Result<()> {
        let turn_index = self.turns;
        let new: Vec<ToolCallRecord> = calls
            .iter()
            .zip(responses)
            .map(|(call, response)| {
                ToolCallRecord::new(&call.name, call.arguments.clone(), &response.content, turn_index)
            })
            .collect();

        if let Some(path) = &self.file {
            append_records(path, &new)?;
        }

        self.records.extend(new);
        self.turns += 1;
        Ok(())
    }
}

fn append_records(path: &Path, records: &[ToolCallRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for record in records {
        writeln!(file, "{}", serde_json::to_string(record)?)?;
    }
    Ok(())
}

/// Result of one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub responses: Vec<ToolCallResponse>,
    /// The caller is repeating itself and should stop.
    pub stuck: bool,
}

/// Dispatches turns, records them and checks the history for loops.
pub struct TurnRunner {
    tools: Arc<dyn ToolExecutor>,
    dispatcher: SequentialToolDispatcher,
    detector: LoopDetector,
    log: ConversationLog,
}

impl TurnRunner {
    pub fn new(tools: Arc<dyn ToolExecutor>, detector: LoopDetector) -> Self {
        Self {
            tools,
            dispatcher: SequentialToolDispatcher::new(),
            detector,
            log: ConversationLog::new(),
        }
    }

    pub fn with_log(mut self, log: ConversationLog) -> Self {
        self.log = log;
        self
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub async fn run_turn(&mut self, calls: &[ToolCallRequest]) -> Result<TurnOutcome> {
        let turn = self.log.turn_count();
        info!(turn, calls = calls.len(), "Running turn");

        let responses = self.dispatcher.dispatch_turn(self.tools.as_ref(), calls).await?;
        if let Err(e) = self.log.record_turn(calls, &responses) {
            warn!(turn, error = %e, "Failed to persist conversation log");
        }

        let stuck = self.detector.is_stuck(self.log.records());
        if stuck {
            warn!(turn, "Caller is stuck in a loop, stop issuing turns");
        }
        Ok(TurnOutcome { responses, stuck })
    }
}
