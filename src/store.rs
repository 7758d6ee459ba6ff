use crate::model::{format_naive, parse_stored_naive, Task};
use chrono::NaiveDateTime;
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stored task {id} has an unreadable {field}: {value:?}")]
    CorruptRow {
        id: String,
        field: &'static str,
        value: String,
    },
}

pub const META_LAST_UPDATE: &str = "last_update";
pub const META_LAST_SOURCE: &str = "last_source";

const TASK_COLUMNS: &str =
    "id, project, text, status, start_at, end_at, user_id, progress, extra_json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Id,
    Start,
    End,
}

impl SortKey {
    fn order_by(self) -> &'static str {
        match self {
            SortKey::Id => "id",
            SortKey::Start => "start_at, id",
            SortKey::End => "end_at, id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Project,
    User,
    Status,
}

impl TaskField {
    fn column(self) -> &'static str {
        match self {
            TaskField::Project => "project",
            TaskField::User => "user_id",
            TaskField::Status => "status",
        }
    }
}

/// Conjunction of optional predicates over the tasks collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    /// `end < x`
    pub end_before: Option<NaiveDateTime>,
    /// `end >= x`
    pub end_from: Option<NaiveDateTime>,
    /// `end <= x`
    pub end_through: Option<NaiveDateTime>,
    pub status_eq: Option<String>,
    pub status_not_in: Vec<String>,
    pub user_eq: Option<String>,
    /// Compared after Unicode lower-casing, applied once rows are loaded.
    pub project_eq: Option<String>,
}

impl TaskFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut parts: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();
        if let Some(x) = &self.end_before {
            parts.push("end_at < ?".into());
            values.push(Value::Text(format_naive(x)));
        }
        if let Some(x) = &self.end_from {
            parts.push("end_at >= ?".into());
            values.push(Value::Text(format_naive(x)));
        }
        if let Some(x) = &self.end_through {
            parts.push("end_at <= ?".into());
            values.push(Value::Text(format_naive(x)));
        }
        if let Some(s) = &self.status_eq {
            parts.push("status = ?".into());
            values.push(Value::Text(s.clone()));
        }
        if !self.status_not_in.is_empty() {
            let placeholders = std::iter::repeat("?")
                .take(self.status_not_in.len())
                .collect::<Vec<_>>()
                .join(",");
            parts.push(format!("status NOT IN ({})", placeholders));
            for s in &self.status_not_in {
                values.push(Value::Text(s.clone()));
            }
        }
        if let Some(u) = &self.user_eq {
            parts.push("user_id = ?".into());
            values.push(Value::Text(u.clone()));
        }
        if parts.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", parts.join(" AND ")), values)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub user_id: String,
    pub role: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRun {
    pub id: String,
    pub file_name: String,
    pub sha256: String,
    pub total_rows: usize,
    pub inserted: usize,
    pub updated: usize,
    pub dropped: usize,
    pub started_at: String,
}

struct RawTaskRow {
    id: String,
    project: String,
    text: String,
    status: String,
    start_at: String,
    end_at: String,
    user_id: String,
    progress: Option<f64>,
    extra_json: String,
}

impl RawTaskRow {
    fn into_task(self) -> Result<Task, StoreError> {
        let Some(start) = parse_stored_naive(&self.start_at) else {
            return Err(StoreError::CorruptRow {
                id: self.id,
                field: "start",
                value: self.start_at,
            });
        };
        let Some(end) = parse_stored_naive(&self.end_at) else {
            return Err(StoreError::CorruptRow {
                id: self.id,
                field: "end",
                value: self.end_at,
            });
        };
        let extra: BTreeMap<String, String> = serde_json::from_str(&self.extra_json)?;
        Ok(Task {
            id: self.id,
            project: self.project,
            text: self.text,
            status: self.status,
            start,
            end,
            user: self.user_id,
            progress: self.progress,
            extra,
        })
    }
}

pub fn find_tasks(
    conn: &Connection,
    filter: &TaskFilter,
    sort: SortKey,
) -> Result<Vec<Task>, StoreError> {
    let (where_sql, values) = filter.where_clause();
    let sql = format!(
        "SELECT {} FROM tasks{} ORDER BY {}",
        TASK_COLUMNS,
        where_sql,
        sort.order_by()
    );
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map(params_from_iter(values), |r| {
            Ok(RawTaskRow {
                id: r.get(0)?,
                project: r.get(1)?,
                text: r.get(2)?,
                status: r.get(3)?,
                start_at: r.get(4)?,
                end_at: r.get(5)?,
                user_id: r.get(6)?,
                progress: r.get(7)?,
                extra_json: r.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let project = filter.project_eq.as_deref().map(str::to_lowercase);
    let mut out = Vec::with_capacity(raw.len());
    for row in raw {
        if let Some(p) = &project {
            // SQLite NOCASE folds ASCII only.
            if row.project.to_lowercase() != *p {
                continue;
            }
        }
        out.push(row.into_task()?);
    }
    Ok(out)
}

/// Every stored task, ordered by id. Rollups run over this one snapshot.
pub fn load_tasks(conn: &Connection) -> Result<Vec<Task>, StoreError> {
    find_tasks(conn, &TaskFilter::default(), SortKey::Id)
}

pub fn count_tasks(conn: &Connection) -> Result<usize, StoreError> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM tasks", [], |r| r.get(0))?;
    Ok(n.max(0) as usize)
}

/// Replaces the whole stored document for `task.id`, or inserts it.
pub fn upsert_task(
    conn: &Connection,
    task: &Task,
    stamped_at: &str,
) -> Result<UpsertOutcome, StoreError> {
    let exists = conn
        .query_row("SELECT 1 FROM tasks WHERE id = ?", [&task.id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some();
    let extra_json = serde_json::to_string(&task.extra)?;
    conn.execute(
        "INSERT INTO tasks(id, project, text, status, start_at, end_at, user_id, progress, extra_json, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            project = excluded.project,
            text = excluded.text,
            status = excluded.status,
            start_at = excluded.start_at,
            end_at = excluded.end_at,
            user_id = excluded.user_id,
            progress = excluded.progress,
            extra_json = excluded.extra_json,
            updated_at = excluded.updated_at",
        (
            &task.id,
            &task.project,
            &task.text,
            &task.status,
            format_naive(&task.start),
            format_naive(&task.end),
            &task.user,
            task.progress,
            extra_json,
            stamped_at,
        ),
    )?;
    Ok(if exists {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    })
}

/// Distinct non-blank values of `field` across the whole collection, sorted.
pub fn distinct_values(conn: &Connection, field: TaskField) -> Result<Vec<String>, StoreError> {
    let col = field.column();
    let sql = format!(
        "SELECT DISTINCT {col} FROM tasks WHERE TRIM({col}) <> '' ORDER BY {col}",
        col = col
    );
    let mut stmt = conn.prepare(&sql)?;
    let out = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(out)
}

pub fn metadata_set(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
    updated_at: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO metadata(key, value_json, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
        (key, serde_json::to_string(value)?, updated_at),
    )?;
    Ok(())
}

pub fn metadata_get(conn: &Connection, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM metadata WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn upsert_resource(
    conn: &Connection,
    user_id: &str,
    role: &str,
    updated_at: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO resources(user_id, role, updated_at) VALUES(?, ?, ?)
         ON CONFLICT(user_id) DO UPDATE SET role = excluded.role, updated_at = excluded.updated_at",
        (user_id, role, updated_at),
    )?;
    Ok(())
}

pub fn list_resources(conn: &Connection) -> Result<Vec<Resource>, StoreError> {
    let mut stmt =
        conn.prepare("SELECT user_id, role, updated_at FROM resources ORDER BY user_id")?;
    let out = stmt
        .query_map([], |r| {
            Ok(Resource {
                user_id: r.get(0)?,
                role: r.get(1)?,
                updated_at: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(out)
}

pub fn insert_ingest_run(conn: &Connection, run: &IngestRun) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO ingest_runs(id, file_name, sha256, total_rows, inserted, updated, dropped, started_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &run.id,
            &run.file_name,
            &run.sha256,
            run.total_rows as i64,
            run.inserted as i64,
            run.updated as i64,
            run.dropped as i64,
            &run.started_at,
        ),
    )?;
    Ok(())
}

pub fn list_ingest_runs(conn: &Connection, limit: usize) -> Result<Vec<IngestRun>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, file_name, sha256, total_rows, inserted, updated, dropped, started_at
         FROM ingest_runs
         ORDER BY started_at DESC, rowid DESC
         LIMIT ?",
    )?;
    let out = stmt
        .query_map([limit as i64], |r| {
            Ok(IngestRun {
                id: r.get(0)?,
                file_name: r.get(1)?,
                sha256: r.get(2)?,
                total_rows: r.get::<_, i64>(3)?.max(0) as usize,
                inserted: r.get::<_, i64>(4)?.max(0) as usize,
                updated: r.get::<_, i64>(5)?.max(0) as usize,
                dropped: r.get::<_, i64>(6)?.max(0) as usize,
                started_at: r.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(out)
}
