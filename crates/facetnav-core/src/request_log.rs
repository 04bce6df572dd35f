//! Structured JSONL request log.
//!
//! One line per facade call. Writing is best effort: a failed append never fails the request.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

use chrono::Utc;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::{NavError, Result};
use crate::models::RequestLogEntry;

#[derive(Debug, Default)]
pub struct RequestLog {
    path: Option<PathBuf>,
    append_lock: Mutex<()>,
}

/// Request identity and timing shared by every log call of one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub operation: &'static str,
    pub started: Instant,
    pub session_id: Option<String>,
    pub target: Option<String>,
}

impl RequestLog {
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            append_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn try_log(&self, entry: &RequestLogEntry) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        let Ok(mut line) = serde_json::to_string(entry) else {
            return;
        };
        line.push('\n');
        let Ok(_guard) = self.append_lock.lock() else {
            return;
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            let _ = std::fs::create_dir_all(parent);
        }
        let appended = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| file.write_all(line.as_bytes()));
        if let Err(err) = appended {
            warn!(path = %path.display(), error = %err, "request log append failed");
        }
    }

    fn entry(context: &RequestContext, status: &str) -> RequestLogEntry {
        RequestLogEntry {
            request_id: context.request_id.clone(),
            operation: context.operation.to_string(),
            status: status.to_string(),
            latency_ms: context.started.elapsed().as_millis(),
            created_at: Utc::now().to_rfc3339(),
            session_id: context.session_id.clone(),
            target: context.target.clone(),
            error_code: None,
            error_message: None,
            details: None,
        }
    }

    pub fn log_status(&self, context: &RequestContext, details: Option<serde_json::Value>) {
        let mut entry = Self::entry(context, "ok");
        entry.details = details;
        self.try_log(&entry);
    }

    pub fn log_error(
        &self,
        context: &RequestContext,
        err: &NavError,
        details: Option<serde_json::Value>,
    ) {
        let mut entry = Self::entry(context, "error");
        entry.error_code = Some(err.code().to_string());
        entry.error_message = Some(err.to_string());
        entry.details = details;
        self.try_log(&entry);
    }

    pub fn log_warning(
        &self,
        context: &RequestContext,
        warning_message: &str,
        details: Option<serde_json::Value>,
    ) {
        let mut entry = Self::entry(context, "warning");
        entry.error_message = Some(warning_message.to_string());
        entry.details = details;
        self.try_log(&entry);
    }

    /// Entries written so far; malformed lines are skipped.
    pub fn read_entries(&self) -> Result<Vec<RequestLogEntry>> {
        let Some(path) = self.path.as_deref() else {
            return Ok(Vec::new());
        };
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let outcome = parse_jsonl_tolerant::<RequestLogEntry>(&raw);
        if outcome.items.is_empty() && outcome.skipped_lines > 0 {
            return Err(NavError::Validation(format!(
                "request log {} has no readable lines (skipped {})",
                path.display(),
                outcome.skipped_lines
            )));
        }
        Ok(outcome.items)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct JsonlParseOutcome<T> {
    pub(crate) items: Vec<T>,
    pub(crate) skipped_lines: usize,
}

pub(crate) fn parse_jsonl_tolerant<T>(raw: &str) -> JsonlParseOutcome<T>
where
    T: DeserializeOwned,
{
    let mut items = Vec::new();
    let mut skipped_lines = 0usize;
    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(line) {
            Ok(value) => items.push(value),
            Err(_) => skipped_lines += 1,
        }
    }
    JsonlParseOutcome {
        items,
        skipped_lines,
    }
}
