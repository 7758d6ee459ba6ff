use crate::ingest::IngestError;
use crate::store::StoreError;
use serde::Serialize;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Serializes a typed result into an `ok` envelope.
pub fn ok_serialized<T: Serialize>(id: &str, result: &T) -> serde_json::Value {
    match serde_json::to_value(result) {
        Ok(v) => ok(id, v),
        Err(e) => {
            tracing::error!(request = id, error = %e, "result serialization failed");
            err(id, "internal", e.to_string(), None)
        }
    }
}

pub fn store_err(id: &str, method: &str, e: &StoreError) -> serde_json::Value {
    tracing::error!(request = id, method, error = %e, "store operation failed");
    err(id, "internal", e.to_string(), None)
}

pub fn ingest_err(id: &str, e: IngestError) -> serde_json::Value {
    let code = e.code();
    let message = e.to_string();
    let details = match e {
        IngestError::InvalidFileType(name) => Some(json!({ "fileName": name })),
        IngestError::MissingColumns(missing) => Some(json!({ "missing": missing })),
        IngestError::UnterminatedQuote { line } => Some(json!({ "line": line })),
        IngestError::NoValidRows { total_rows, dropped } => Some(json!({
            "totalRecords": total_rows,
            "droppedRows": dropped,
        })),
        IngestError::Store(inner) => {
            tracing::error!(request = id, error = %inner, "ingestion failed");
            None
        }
        IngestError::EmptyFile | IngestError::InvalidEncoding => None,
    };
    if code != "internal" {
        tracing::warn!(request = id, code, message = %message, "ingestion rejected");
    }
    err(id, code, message, details)
}
