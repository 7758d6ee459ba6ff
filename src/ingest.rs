use crate::dates::parse_task_date;
use crate::model::{normalize_status, Task, DEFAULT_ROLE, UNASSIGNED_USER};
use crate::store::{self, IngestRun, StoreError, UpsertOutcome, META_LAST_SOURCE, META_LAST_UPDATE};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use uuid::Uuid;

/// Dropped rows beyond this are counted but not itemized.
pub const MAX_DROPPED_REPORT: usize = 100;

pub const REQUIRED_COLUMNS: [&str; 6] = ["id", "project", "text", "status", "start", "end"];

/// Columns that land on `Task` fields. Any other column goes to `extra`.
const TASK_FIELDS: [&str; 8] = [
    "id", "project", "text", "status", "start", "end", "user", "progress",
];

const ROLE_COLUMN: &str = "user_role";

const COLUMN_ALIASES: [(&str, &str); 13] = [
    ("task_id", "id"),
    ("project_name", "project"),
    ("project_id", "project"),
    ("due_date", "end"),
    ("end_date", "end"),
    ("start_date", "start"),
    ("assigned_to", "user"),
    ("assigned_user_id", "user"),
    ("estimated_effort_hrs", "effort_hrs"),
    ("description", "text"),
    ("task_description", "text"),
    ("name", "text"),
    ("title", "text"),
];

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("only .csv files are accepted (got {0:?})")]
    InvalidFileType(String),

    #[error("uploaded file is empty")]
    EmptyFile,

    #[error("uploaded file is not valid UTF-8")]
    InvalidEncoding,

    #[error("quoted field opened on line {line} is never closed")]
    UnterminatedQuote { line: usize },

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("no valid data after cleaning")]
    NoValidRows {
        total_rows: usize,
        dropped: Vec<DroppedRow>,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::InvalidFileType(_) => "invalid_file_type",
            IngestError::EmptyFile => "empty_file",
            IngestError::InvalidEncoding => "invalid_encoding",
            IngestError::UnterminatedQuote { .. } => "unterminated_quote",
            IngestError::MissingColumns(_) => "missing_columns",
            IngestError::NoValidRows { .. } => "no_valid_rows",
            IngestError::Store(_) => "internal",
        }
    }
}

impl From<rusqlite::Error> for IngestError {
    fn from(e: rusqlite::Error) -> Self {
        IngestError::Store(StoreError::from(e))
    }
}

pub struct Upload<'a> {
    pub file_name: &'a str,
    pub bytes: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRow {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct NormalizedRow {
    pub line: usize,
    pub task: Task,
    pub role: Option<String>,
}

#[derive(Debug, Default)]
pub struct ParsedUpload {
    pub rows: Vec<NormalizedRow>,
    pub dropped: Vec<DroppedRow>,
    pub total_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub total_records: usize,
    pub inserted: usize,
    pub updated: usize,
    pub dropped: usize,
    pub dropped_rows: Vec<DroppedRow>,
    pub run_id: String,
    pub sha256: String,
    pub last_update: String,
}

pub fn normalize_header(raw: &str) -> String {
    raw.trim().replace(' ', "_").to_lowercase()
}

pub fn canonical_column(normalized: &str) -> &str {
    COLUMN_ALIASES
        .iter()
        .find(|(from, _)| *from == normalized)
        .map(|(_, to)| *to)
        .unwrap_or(normalized)
}

pub fn check_file_name(file_name: &str) -> Result<(), IngestError> {
    if file_name.trim().to_ascii_lowercase().ends_with(".csv") {
        Ok(())
    } else {
        Err(IngestError::InvalidFileType(file_name.to_string()))
    }
}

/// Splits CSV text into records. A field that opens with `"` is quoted and
/// may contain commas, `""` escapes and line breaks; a `"` anywhere else is a
/// literal character. Each record carries the 1-based line it starts on;
/// blank lines produce no record.
fn split_records(text: &str) -> Result<Vec<(usize, Vec<String>)>, IngestError> {
    let mut out: Vec<(usize, Vec<String>)> = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut field_start = true;
    let mut quote_line = 0usize;
    let mut line = 1usize;
    let mut record_line = 1usize;
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if in_quotes {
            if ch == '"' {
                if i + 1 < chars.len() && chars[i + 1] == '"' {
                    buf.push('"');
                    i += 2;
                    continue;
                }
                in_quotes = false;
            } else {
                if ch == '\n' {
                    line += 1;
                }
                buf.push(ch);
            }
            i += 1;
            continue;
        }
        if ch == '"' && field_start {
            in_quotes = true;
            field_start = false;
            quote_line = line;
            i += 1;
            continue;
        }
        if ch == ',' {
            fields.push(std::mem::take(&mut buf));
            field_start = true;
            i += 1;
            continue;
        }
        if ch == '\n' || ch == '\r' {
            if ch == '\r' && i + 1 < chars.len() && chars[i + 1] == '\n' {
                i += 1;
            }
            fields.push(std::mem::take(&mut buf));
            push_record(&mut out, record_line, std::mem::take(&mut fields));
            field_start = true;
            line += 1;
            record_line = line;
            i += 1;
            continue;
        }
        buf.push(ch);
        field_start = false;
        i += 1;
    }
    if in_quotes {
        return Err(IngestError::UnterminatedQuote { line: quote_line });
    }
    if !buf.is_empty() || !fields.is_empty() {
        fields.push(buf);
        push_record(&mut out, record_line, fields);
    }
    Ok(out)
}

fn push_record(out: &mut Vec<(usize, Vec<String>)>, line: usize, fields: Vec<String>) {
    if fields.len() == 1 && fields[0].trim().is_empty() {
        return;
    }
    out.push((line, fields));
}

/// Accepts `42`, `42.5`, `42,5` and a trailing `%`.
fn parse_progress(raw: &str) -> Option<f64> {
    let t = raw.trim().trim_end_matches('%').trim();
    if t.is_empty() {
        return None;
    }
    t.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

struct ColumnMap {
    /// Canonical name to the left-most column index carrying it.
    fields: HashMap<String, usize>,
    /// Shadowed duplicates, kept under their normalized header.
    shadowed: Vec<(String, usize)>,
}

impl ColumnMap {
    fn from_headers(headers: &[String]) -> Self {
        let mut fields: HashMap<String, usize> = HashMap::new();
        let mut shadowed: Vec<(String, usize)> = Vec::new();
        for (idx, raw) in headers.iter().enumerate() {
            let normalized = normalize_header(raw);
            if normalized.is_empty() {
                continue;
            }
            let canonical = canonical_column(&normalized).to_string();
            if fields.contains_key(&canonical) {
                if !shadowed.iter().any(|(name, _)| *name == normalized) {
                    shadowed.push((normalized, idx));
                }
            } else {
                fields.insert(canonical, idx);
            }
        }
        ColumnMap { fields, shadowed }
    }

    fn missing_required(&self) -> Vec<String> {
        REQUIRED_COLUMNS
            .iter()
            .filter(|c| !self.fields.contains_key(**c))
            .map(|c| c.to_string())
            .collect()
    }

    fn cell<'a>(&self, cells: &'a [String], name: &str) -> &'a str {
        self.fields
            .get(name)
            .and_then(|idx| cells.get(*idx))
            .map(|s| s.trim())
            .unwrap_or("")
    }

    fn normalize_row(&self, cells: &[String]) -> Result<(Task, Option<String>), String> {
        let id = self.cell(cells, "id");
        if id.is_empty() {
            return Err("blank id".into());
        }
        let start = parse_task_date(self.cell(cells, "start"));
        let end = parse_task_date(self.cell(cells, "end"));
        let (start, end) = match (start, end) {
            (Some(s), Some(e)) => (s, e),
            (None, None) => return Err("unparseable start and end".into()),
            (None, Some(_)) => return Err("unparseable start".into()),
            (Some(_), None) => return Err("unparseable end".into()),
        };

        let user = match self.cell(cells, "user") {
            "" => UNASSIGNED_USER.to_string(),
            u => u.to_string(),
        };

        let mut extra: BTreeMap<String, String> = BTreeMap::new();
        let unmapped = self
            .fields
            .iter()
            .filter(|(name, _)| !TASK_FIELDS.contains(&name.as_str()))
            .map(|(name, idx)| (name.as_str(), *idx));
        let shadowed = self.shadowed.iter().map(|(name, idx)| (name.as_str(), *idx));
        for (name, idx) in unmapped.chain(shadowed) {
            let value = cells.get(idx).map(|s| s.trim()).unwrap_or("");
            if !value.is_empty() {
                extra.entry(name.to_string()).or_insert_with(|| value.to_string());
            }
        }
        let role = extra.get(ROLE_COLUMN).cloned();

        let task = Task {
            id: id.to_string(),
            project: self.cell(cells, "project").to_string(),
            text: self.cell(cells, "text").to_string(),
            status: normalize_status(self.cell(cells, "status")),
            start,
            end,
            user,
            progress: parse_progress(self.cell(cells, "progress")),
            extra,
        };
        Ok((task, role))
    }
}

/// Turns uploaded CSV text into canonical tasks plus a report of dropped rows.
///
/// Fails only on structural problems: no header, an unclosed quote, missing
/// required columns.
/// Rows with unusable values are reported in `dropped`, never fatal.
pub fn normalize_upload(text: &str) -> Result<ParsedUpload, IngestError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = split_records(text)?.into_iter();
    let Some((_, header)) = records.next() else {
        return Err(IngestError::EmptyFile);
    };
    let columns = ColumnMap::from_headers(&header);
    let missing = columns.missing_required();
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns(missing));
    }

    let mut parsed = ParsedUpload::default();
    for (line, cells) in records {
        parsed.total_rows += 1;
        match columns.normalize_row(&cells) {
            Ok((task, role)) => parsed.rows.push(NormalizedRow { line, task, role }),
            Err(reason) => parsed.dropped.push(DroppedRow { line, reason }),
        }
    }
    Ok(parsed)
}

/// Validates, normalizes and upserts one uploaded file.
///
/// All writes (tasks, resources, metadata, the ingest run row) share one
/// transaction, so a failure leaves the store as it was.
pub fn ingest_upload(
    conn: &Connection,
    upload: &Upload<'_>,
    received_at: DateTime<Utc>,
) -> Result<IngestSummary, IngestError> {
    check_file_name(upload.file_name)?;
    if upload.bytes.is_empty() {
        return Err(IngestError::EmptyFile);
    }
    let text = std::str::from_utf8(upload.bytes).map_err(|_| IngestError::InvalidEncoding)?;
    let parsed = normalize_upload(text)?;
    for d in &parsed.dropped {
        tracing::debug!(line = d.line, reason = %d.reason, "row dropped");
    }
    if parsed.rows.is_empty() {
        return Err(IngestError::NoValidRows {
            total_rows: parsed.total_rows,
            dropped: truncated(&parsed.dropped),
        });
    }

    let sha256 = format!("{:x}", Sha256::digest(upload.bytes));
    let run_id = Uuid::new_v4().to_string();
    let stamp = received_at.to_rfc3339_opts(SecondsFormat::Secs, true);

    let tx = conn.unchecked_transaction()?;
    let mut inserted = 0usize;
    let mut updated = 0usize;
    // First non-blank role seen for a user wins within one upload.
    let mut roles: BTreeMap<&str, Option<&str>> = BTreeMap::new();
    for row in &parsed.rows {
        let outcome = store::upsert_task(&tx, &row.task, &stamp)?;
        tracing::trace!(line = row.line, id = %row.task.id, ?outcome, "row upserted");
        match outcome {
            UpsertOutcome::Inserted => inserted += 1,
            UpsertOutcome::Updated => updated += 1,
        }
        if row.task.is_assigned() {
            let slot = roles.entry(row.task.user.as_str()).or_insert(None);
            if slot.is_none() {
                *slot = row.role.as_deref();
            }
        }
    }
    for (user, role) in &roles {
        store::upsert_resource(&tx, user, role.unwrap_or(DEFAULT_ROLE), &stamp)?;
    }

    store::metadata_set(&tx, META_LAST_UPDATE, &json!({ "timestamp": stamp }), &stamp)?;
    store::metadata_set(
        &tx,
        META_LAST_SOURCE,
        &json!({ "fileName": upload.file_name, "sha256": sha256, "runId": run_id }),
        &stamp,
    )?;
    let run = IngestRun {
        id: run_id.clone(),
        file_name: upload.file_name.to_string(),
        sha256: sha256.clone(),
        total_rows: parsed.total_rows,
        inserted,
        updated,
        dropped: parsed.dropped.len(),
        started_at: stamp.clone(),
    };
    store::insert_ingest_run(&tx, &run)?;
    tx.commit()?;

    tracing::info!(
        file = %upload.file_name,
        run_id = %run_id,
        total = parsed.total_rows,
        inserted,
        updated,
        dropped = parsed.dropped.len(),
        "csv ingested"
    );

    Ok(IngestSummary {
        total_records: parsed.total_rows,
        inserted,
        updated,
        dropped: parsed.dropped.len(),
        dropped_rows: truncated(&parsed.dropped),
        run_id,
        sha256,
        last_update: stamp,
    })
}

fn truncated(dropped: &[DroppedRow]) -> Vec<DroppedRow> {
    dropped.iter().take(MAX_DROPPED_REPORT).cloned().collect()
}
