use super::{db_conn, local_now, optional_str};
use crate::calc::{self, GanttFilters, GanttView, MAX_UPCOMING_DAYS, UPCOMING_BY_DAY_WINDOW};
use crate::ipc::error::{err, ok, ok_serialized, store_err};
use crate::ipc::types::{AppState, Request};
use crate::model::Task;
use crate::store::{self, SortKey, StoreError, TaskField, TaskFilter};
use rusqlite::Connection;
use serde_json::json;

fn list(
    state: &AppState,
    req: &Request,
    filter: &TaskFilter,
    sort: SortKey,
) -> Result<Vec<Task>, serde_json::Value> {
    let conn = db_conn(state, req)?;
    store::find_tasks(conn, filter, sort).map_err(|e| store_err(&req.id, &req.method, &e))
}

fn handle_all(state: &mut AppState, req: &Request) -> serde_json::Value {
    match list(state, req, &TaskFilter::default(), SortKey::Id) {
        Ok(tasks) => ok(&req.id, json!({ "tasks": tasks })),
        Err(e) => e,
    }
}

fn handle_overdue(state: &mut AppState, req: &Request) -> serde_json::Value {
    let now = local_now();
    match list(state, req, &calc::overdue_filter(now), SortKey::End) {
        Ok(tasks) => ok(&req.id, json!({ "tasks": calc::annotate_overdue(tasks, now) })),
        Err(e) => e,
    }
}

fn parse_days(state: &AppState, req: &Request) -> Result<i64, serde_json::Value> {
    match req.params.get("days") {
        None | Some(serde_json::Value::Null) => Ok(state.config.upcoming_days),
        Some(v) => match v.as_i64() {
            Some(n) if (1..=MAX_UPCOMING_DAYS).contains(&n) => Ok(n),
            _ => Err(err(
                &req.id,
                "bad_params",
                format!("days must be an integer between 1 and {}", MAX_UPCOMING_DAYS),
                Some(json!({ "days": v })),
            )),
        },
    }
}

fn handle_upcoming(state: &mut AppState, req: &Request) -> serde_json::Value {
    let days = match parse_days(state, req) {
        Ok(d) => d,
        Err(e) => return e,
    };
    match list(state, req, &calc::upcoming_filter(local_now(), days), SortKey::End) {
        Ok(tasks) => ok(&req.id, json!({ "days": days, "tasks": tasks })),
        Err(e) => e,
    }
}

fn handle_daily(state: &mut AppState, req: &Request) -> serde_json::Value {
    match list(state, req, &calc::daily_filter(local_now()), SortKey::End) {
        Ok(tasks) => ok(&req.id, json!({ "tasks": tasks })),
        Err(e) => e,
    }
}

/// Facets come from the whole collection so filter dropdowns never shrink.
fn gantt_view(conn: &Connection, filters: &GanttFilters) -> Result<GanttView, StoreError> {
    let tasks = store::find_tasks(conn, &calc::gantt_filter(filters), SortKey::Start)?;
    Ok(GanttView {
        rows: calc::gantt_rows(&tasks),
        distinct_projects: store::distinct_values(conn, TaskField::Project)?,
        distinct_users: store::distinct_values(conn, TaskField::User)?,
        distinct_statuses: store::distinct_values(conn, TaskField::Status)?,
    })
}

fn handle_gantt(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let filters = GanttFilters {
        status: optional_str(req, "status"),
        user: optional_str(req, "userId"),
        project: optional_str(req, "project"),
    };
    match gantt_view(conn, &filters) {
        Ok(v) => ok_serialized(&req.id, &v),
        Err(e) => store_err(&req.id, &req.method, &e),
    }
}

fn handle_overdue_by_user(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match store::load_tasks(conn) {
        Ok(tasks) => ok(
            &req.id,
            json!({ "users": calc::overdue_by_user(&tasks, local_now()) }),
        ),
        Err(e) => store_err(&req.id, &req.method, &e),
    }
}

fn handle_upcoming_by_day(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match store::load_tasks(conn) {
        Ok(tasks) => ok(
            &req.id,
            json!({
                "windowDays": UPCOMING_BY_DAY_WINDOW,
                "days": calc::upcoming_by_day(&tasks, local_now()),
            }),
        ),
        Err(e) => store_err(&req.id, &req.method, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "tasks.all" => Some(handle_all(state, req)),
        "tasks.overdue" => Some(handle_overdue(state, req)),
        "tasks.upcoming" => Some(handle_upcoming(state, req)),
        "tasks.daily" => Some(handle_daily(state, req)),
        "tasks.gantt" => Some(handle_gantt(state, req)),
        "tasks.overdueByUser" => Some(handle_overdue_by_user(state, req)),
        "tasks.upcomingByDay" => Some(handle_upcoming_by_day(state, req)),
        _ => None,
    }
}
