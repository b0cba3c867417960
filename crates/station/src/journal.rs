#![forbid(unsafe_code)]

//! Best-effort last-session record for one station process. When a judge
//! reports "it stopped working", this file says what the station was
//! doing last; it never fails the operation that writes it.

use crate::support::now_rfc3339;
use std::path::{Path, PathBuf};

const JOURNAL_FILE: &str = "homologation_last_session.txt";

#[derive(Clone, Debug)]
pub struct StationJournal {
    path: PathBuf,
    station: String,
    start_rfc3339: String,
    last_operation: Option<String>,
    last_error: Option<String>,
}

impl StationJournal {
    pub fn new(storage_dir: &Path, station: &str) -> Self {
        let this = Self {
            path: storage_dir.join(JOURNAL_FILE),
            station: station.to_string(),
            start_rfc3339: now_rfc3339(),
            last_operation: None,
            last_error: None,
        };
        this.flush();
        this
    }

    pub fn note_operation(&mut self, operation: &str) {
        let operation = operation.trim();
        if operation.is_empty() {
            return;
        }
        self.last_operation = Some(truncate(operation, 120));
        self.flush();
    }

    pub fn note_error(&mut self, error: &str) {
        let error = error.trim();
        if error.is_empty() {
            return;
        }
        self.last_error = Some(truncate(error, 300));
        self.flush();
    }

    fn flush(&self) {
        let mut body = String::new();
        body.push_str(&format!("station: {}\n", self.station));
        body.push_str(&format!("started: {}\n", self.start_rfc3339));
        if let Some(operation) = &self.last_operation {
            body.push_str(&format!("last_operation: {operation}\n"));
        }
        if let Some(error) = &self.last_error {
            body.push_str(&format!("last_error: {error}\n"));
        }
        let _ = std::fs::write(&self.path, body);
    }
}

fn truncate(value: &str, max: usize) -> String {
    if value.len() <= max {
        return value.to_string();
    }
    let mut end = max;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &value[..end])
}
