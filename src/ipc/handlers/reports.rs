use super::{db_conn, local_now};
use crate::calc::{self, SummaryMetrics};
use crate::ipc::error::{ok, ok_serialized, store_err};
use crate::ipc::types::{AppState, Request};
use crate::model::Task;
use crate::store;
use serde_json::json;

/// Loads the snapshot every rollup in this module runs over.
fn snapshot(state: &AppState, req: &Request) -> Result<Vec<Task>, serde_json::Value> {
    let conn = db_conn(state, req)?;
    store::load_tasks(conn).map_err(|e| store_err(&req.id, &req.method, &e))
}

fn handle_project_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    match snapshot(state, req) {
        Ok(tasks) => ok_serialized(&req.id, &calc::project_status_rollup(&tasks)),
        Err(e) => e,
    }
}

fn handle_status_distribution(state: &mut AppState, req: &Request) -> serde_json::Value {
    match snapshot(state, req) {
        Ok(tasks) => ok(
            &req.id,
            json!({ "statuses": calc::status_distribution(&tasks) }),
        ),
        Err(e) => e,
    }
}

fn handle_workload(state: &mut AppState, req: &Request) -> serde_json::Value {
    match snapshot(state, req) {
        Ok(tasks) => ok(&req.id, json!({ "users": calc::workload_rollup(&tasks) })),
        Err(e) => e,
    }
}

fn handle_scoreboard(state: &mut AppState, req: &Request) -> serde_json::Value {
    match snapshot(state, req) {
        Ok(tasks) => {
            let rows =
                calc::efficiency_scoreboard(calc::workload_rollup(&tasks), &tasks, local_now());
            ok(&req.id, json!({ "users": rows }))
        }
        Err(e) => e,
    }
}

// Dashboard tiles render zeros rather than an error state.
fn handle_metrics_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let metrics = match state.db.as_ref() {
        None => {
            tracing::warn!(request = %req.id, "metrics requested without a workspace");
            SummaryMetrics::default()
        }
        Some(conn) => match store::load_tasks(conn) {
            Ok(tasks) => calc::summary_metrics(&tasks, local_now()),
            Err(e) => {
                tracing::error!(request = %req.id, error = %e, "metrics fell back to zeros");
                SummaryMetrics::default()
            }
        },
    };
    ok_serialized(&req.id, &metrics)
}

fn handle_resources_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let resources = match store::list_resources(conn) {
        Ok(r) => r,
        Err(e) => return store_err(&req.id, &req.method, &e),
    };
    match store::load_tasks(conn) {
        Ok(tasks) => ok(
            &req.id,
            json!({ "resources": calc::resource_load(&resources, &tasks) }),
        ),
        Err(e) => store_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "project.status" => Some(handle_project_status(state, req)),
        "project.statusDistribution" => Some(handle_status_distribution(state, req)),
        "tasks.workload" => Some(handle_workload(state, req)),
        "efficiency.scoreboard" => Some(handle_scoreboard(state, req)),
        "metrics.summary" => Some(handle_metrics_summary(state, req)),
        "resources.load" => Some(handle_resources_load(state, req)),
        _ => None,
    }
}
