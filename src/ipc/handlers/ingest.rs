use super::{db_conn, required_str};
use crate::ingest::{self, Upload};
use crate::ipc::error::{err, ingest_err, ok, ok_serialized, store_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, META_LAST_SOURCE, META_LAST_UPDATE};
use serde_json::json;

const DEFAULT_RUNS_LIMIT: usize = 20;
const MAX_RUNS_LIMIT: usize = 500;

fn handle_ingest_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let file_name = match required_str(req, "fileName") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let bytes: Vec<u8> = if let Some(text) = req.params.get("text").and_then(|v| v.as_str()) {
        text.as_bytes().to_vec()
    } else if let Some(path) = req.params.get("path").and_then(|v| v.as_str()) {
        match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("cannot read {}: {}", path, e),
                    Some(json!({ "path": path })),
                )
            }
        }
    } else {
        return err(&req.id, "bad_params", "missing text or path", None);
    };

    let upload = Upload {
        file_name: &file_name,
        bytes: &bytes,
    };
    match ingest::ingest_upload(conn, &upload, chrono::Utc::now()) {
        Ok(summary) => ok_serialized(&req.id, &summary),
        Err(e) => ingest_err(&req.id, e),
    }
}

fn handle_metadata_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let last_update = match store::metadata_get(conn, META_LAST_UPDATE) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, &req.method, &e),
    };
    let last_source = match store::metadata_get(conn, META_LAST_SOURCE) {
        Ok(v) => v,
        Err(e) => return store_err(&req.id, &req.method, &e),
    };
    ok(
        &req.id,
        json!({
            "lastUpdate": last_update.as_ref().and_then(|v| v.get("timestamp")).cloned(),
            "lastSource": last_source,
        }),
    )
}

fn handle_ingest_runs(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let limit = match req.params.get("limit") {
        None | Some(serde_json::Value::Null) => DEFAULT_RUNS_LIMIT,
        Some(v) => match v.as_u64() {
            Some(n) if n >= 1 => (n as usize).min(MAX_RUNS_LIMIT),
            _ => return err(&req.id, "bad_params", "limit must be a positive integer", None),
        },
    };
    match store::list_ingest_runs(conn, limit) {
        Ok(runs) => ok(&req.id, json!({ "runs": runs })),
        Err(e) => store_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "tasks.ingestCsv" => Some(handle_ingest_csv(state, req)),
        "metadata.get" => Some(handle_metadata_get(state, req)),
        "ingest.runs" => Some(handle_ingest_runs(state, req)),
        _ => None,
    }
}
