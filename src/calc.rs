use crate::dates::{start_of_day, whole_days};
use crate::model::{
    display_user, serialize_naive, Task, DEFAULT_ROLE, KNOWN_STATUSES, STATUS_BLOCKED,
    STATUS_CANCELLED, STATUS_COMPLETED, STATUS_IN_PROGRESS, STATUS_PENDING, STATUS_TO_DO,
};
use crate::store::{Resource, TaskFilter};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_UPCOMING_DAYS: i64 = 30;
/// Widest upcoming window a caller may ask for.
pub const MAX_UPCOMING_DAYS: i64 = 3650;
pub const UPCOMING_BY_DAY_WINDOW: i64 = 7;

/// Statuses that count as "active" in summary metrics.
const ACTIVE_STATUSES: [&str; 3] = [STATUS_IN_PROGRESS, STATUS_TO_DO, STATUS_PENDING];

pub fn round_1_decimal(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

pub fn round_2_decimals(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// `completed / total * 100`, 0 for an empty denominator.
pub fn completion_rate(completed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (completed as f64) / (total as f64) * 100.0
    }
}

fn is_closed(status: &str) -> bool {
    status == STATUS_COMPLETED || status == STATUS_CANCELLED
}

pub fn overdue_filter(now: NaiveDateTime) -> TaskFilter {
    TaskFilter {
        end_before: Some(now),
        status_not_in: vec![STATUS_COMPLETED.to_string()],
        ..TaskFilter::default()
    }
}

/// `[today, today + days]`, both ends inclusive. A window past the calendar
/// range leaves the upper end open.
pub fn upcoming_filter(now: NaiveDateTime, days: i64) -> TaskFilter {
    let today = start_of_day(now);
    TaskFilter {
        end_from: Some(today),
        end_through: Duration::try_days(days).and_then(|d| today.checked_add_signed(d)),
        status_not_in: vec![STATUS_COMPLETED.to_string()],
        ..TaskFilter::default()
    }
}

pub fn daily_filter(now: NaiveDateTime) -> TaskFilter {
    let today = start_of_day(now);
    TaskFilter {
        end_from: Some(today),
        end_before: Some(today + Duration::days(1)),
        status_not_in: vec![STATUS_COMPLETED.to_string()],
        ..TaskFilter::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GanttFilters {
    pub status: Option<String>,
    pub user: Option<String>,
    pub project: Option<String>,
}

pub fn gantt_filter(filters: &GanttFilters) -> TaskFilter {
    TaskFilter {
        status_eq: filters.status.as_deref().map(|s| s.trim().to_uppercase()),
        user_eq: filters.user.clone(),
        project_eq: filters.project.clone(),
        ..TaskFilter::default()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueTask {
    #[serde(flatten)]
    pub task: Task,
    pub days_overdue: i64,
}

pub fn annotate_overdue(tasks: Vec<Task>, now: NaiveDateTime) -> Vec<OverdueTask> {
    tasks
        .into_iter()
        .map(|task| {
            let days_overdue = whole_days(now - task.end).max(1);
            OverdueTask { task, days_overdue }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GanttRow {
    pub id: String,
    pub text: String,
    #[serde(serialize_with = "serialize_naive")]
    pub start_date: NaiveDateTime,
    #[serde(serialize_with = "serialize_naive")]
    pub end_date: NaiveDateTime,
    pub user: String,
    pub project: String,
    pub status: String,
    pub duration_days: i64,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GanttView {
    pub rows: Vec<GanttRow>,
    pub distinct_projects: Vec<String>,
    pub distinct_users: Vec<String>,
    pub distinct_statuses: Vec<String>,
}

pub fn gantt_rows(tasks: &[Task]) -> Vec<GanttRow> {
    tasks
        .iter()
        .map(|t| GanttRow {
            id: t.id.clone(),
            text: t.text.clone(),
            start_date: t.start,
            end_date: t.end,
            user: t.user.clone(),
            project: t.project.clone(),
            status: t.status.clone(),
            duration_days: whole_days(t.end - t.start).max(1),
            progress: t.progress.unwrap_or(0.0),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRollup {
    pub project: String,
    pub statuses: Vec<StatusCount>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatusSummary {
    pub total_projects: usize,
    pub total_tasks: usize,
    pub total_completed: usize,
    pub overall_completion_rate: f64,
    pub avg_completion_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatusReport {
    pub projects: Vec<ProjectRollup>,
    pub summary: ProjectStatusSummary,
}

pub fn project_status_rollup(tasks: &[Task]) -> ProjectStatusReport {
    let mut by_pair: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for t in tasks {
        *by_pair
            .entry((t.project.as_str(), t.status.as_str()))
            .or_insert(0) += 1;
    }

    let mut by_project: BTreeMap<&str, Vec<StatusCount>> = BTreeMap::new();
    for ((project, status), count) in by_pair {
        by_project.entry(project).or_default().push(StatusCount {
            status: status.to_string(),
            count,
        });
    }

    let projects: Vec<ProjectRollup> = by_project
        .into_iter()
        .map(|(project, statuses)| {
            let total_tasks: usize = statuses.iter().map(|s| s.count).sum();
            let completed_tasks = statuses
                .iter()
                .find(|s| s.status == STATUS_COMPLETED)
                .map(|s| s.count)
                .unwrap_or(0);
            ProjectRollup {
                project: project.to_string(),
                statuses,
                total_tasks,
                completed_tasks,
                completion_rate: completion_rate(completed_tasks, total_tasks),
            }
        })
        .collect();

    let total_tasks: usize = projects.iter().map(|p| p.total_tasks).sum();
    let total_completed: usize = projects.iter().map(|p| p.completed_tasks).sum();
    let avg_completion_rate = if projects.is_empty() {
        0.0
    } else {
        projects.iter().map(|p| p.completion_rate).sum::<f64>() / (projects.len() as f64)
    };
    let summary = ProjectStatusSummary {
        total_projects: projects.len(),
        total_tasks,
        total_completed,
        overall_completion_rate: round_1_decimal(completion_rate(total_completed, total_tasks)),
        avg_completion_rate: round_2_decimals(avg_completion_rate),
    };

    ProjectStatusReport { projects, summary }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRow {
    pub raw_user_id: String,
    pub display_user_id: String,
    pub total_tasks: usize,
    pub to_do: usize,
    pub in_progress: usize,
    pub blocked: usize,
}

pub fn workload_rollup(tasks: &[Task]) -> Vec<WorkloadRow> {
    let mut by_user: BTreeMap<&str, WorkloadRow> = BTreeMap::new();
    for t in tasks {
        let row = by_user.entry(t.user.as_str()).or_insert_with(|| WorkloadRow {
            raw_user_id: t.user.clone(),
            display_user_id: display_user(&t.user),
            total_tasks: 0,
            to_do: 0,
            in_progress: 0,
            blocked: 0,
        });
        row.total_tasks += 1;
        match t.status.as_str() {
            STATUS_TO_DO => row.to_do += 1,
            STATUS_IN_PROGRESS => row.in_progress += 1,
            STATUS_BLOCKED => row.blocked += 1,
            _ => {}
        }
    }
    let mut rows: Vec<WorkloadRow> = by_user.into_values().collect();
    rows.sort_by(|a, b| {
        b.total_tasks
            .cmp(&a.total_tasks)
            .then_with(|| a.raw_user_id.cmp(&b.raw_user_id))
    });
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardRow {
    #[serde(flatten)]
    pub workload: WorkloadRow,
    pub overdue_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: f64,
}

/// Ranks users by completion rate, then fewest overdue, then user id.
pub fn efficiency_scoreboard(
    workload: Vec<WorkloadRow>,
    tasks: &[Task],
    now: NaiveDateTime,
) -> Vec<ScoreboardRow> {
    let mut overdue: HashMap<&str, usize> = HashMap::new();
    let mut completed: HashMap<&str, usize> = HashMap::new();
    for t in tasks {
        if !is_closed(&t.status) && t.end < now {
            *overdue.entry(t.user.as_str()).or_insert(0) += 1;
        }
        if t.is_completed() {
            *completed.entry(t.user.as_str()).or_insert(0) += 1;
        }
    }

    let mut rows: Vec<ScoreboardRow> = workload
        .into_iter()
        .map(|w| {
            let overdue_tasks = overdue.get(w.raw_user_id.as_str()).copied().unwrap_or(0);
            let completed_tasks = completed.get(w.raw_user_id.as_str()).copied().unwrap_or(0);
            let rate = round_1_decimal(completion_rate(completed_tasks, w.total_tasks));
            ScoreboardRow {
                workload: w,
                overdue_tasks,
                completed_tasks,
                completion_rate: rate,
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.completion_rate
            .partial_cmp(&a.completion_rate)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.overdue_tasks.cmp(&b.overdue_tasks))
            .then_with(|| a.workload.raw_user_id.cmp(&b.workload.raw_user_id))
    });
    rows
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryMetrics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: f64,
    pub overdue_tasks: usize,
    pub active_tasks: usize,
    pub avg_completion_time: f64,
}

pub fn summary_metrics(tasks: &[Task], now: NaiveDateTime) -> SummaryMetrics {
    let total_tasks = tasks.len();
    let completed_tasks = tasks.iter().filter(|t| t.is_completed()).count();
    let overdue_tasks = tasks
        .iter()
        .filter(|t| !t.is_completed() && t.end < now)
        .count();
    let active_tasks = tasks
        .iter()
        .filter(|t| ACTIVE_STATUSES.contains(&t.status.as_str()))
        .count();

    // Non-positive spans are excluded, not averaged in as zero.
    let spans: Vec<i64> = tasks
        .iter()
        .filter(|t| t.is_completed())
        .map(|t| whole_days(t.end - t.start))
        .filter(|d| *d > 0)
        .collect();
    let avg_completion_time = if spans.is_empty() {
        0.0
    } else {
        spans.iter().sum::<i64>() as f64 / (spans.len() as f64)
    };

    SummaryMetrics {
        total_tasks,
        completed_tasks,
        completion_rate: round_1_decimal(completion_rate(completed_tasks, total_tasks)),
        overdue_tasks,
        active_tasks,
        avg_completion_time: round_1_decimal(avg_completion_time),
    }
}

pub fn status_distribution(tasks: &[Task]) -> Vec<StatusCount> {
    let mut counts: BTreeMap<&str, usize> = KNOWN_STATUSES.iter().map(|s| (*s, 0)).collect();
    for t in tasks {
        *counts.entry(t.status.as_str()).or_insert(0) += 1;
    }
    let mut out: Vec<StatusCount> = counts
        .into_iter()
        .map(|(status, count)| StatusCount {
            status: status.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.status.cmp(&b.status)));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOverdueCount {
    pub user_id: String,
    pub display_user_id: String,
    pub overdue_count: usize,
}

pub fn overdue_by_user(tasks: &[Task], now: NaiveDateTime) -> Vec<UserOverdueCount> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for t in tasks.iter().filter(|t| !is_closed(&t.status) && t.end < now) {
        *counts.entry(t.user.as_str()).or_insert(0) += 1;
    }
    let mut out: Vec<UserOverdueCount> = counts
        .into_iter()
        .map(|(user, overdue_count)| UserOverdueCount {
            user_id: user.to_string(),
            display_user_id: display_user(user),
            overdue_count,
        })
        .collect();
    out.sort_by(|a, b| {
        b.overdue_count
            .cmp(&a.overdue_count)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayCount {
    pub date: String,
    pub count: usize,
}

/// Open tasks due in `[today, today + 7 days)`, bucketed by calendar day.
pub fn upcoming_by_day(tasks: &[Task], now: NaiveDateTime) -> Vec<DayCount> {
    let today = start_of_day(now);
    let until = today + Duration::days(UPCOMING_BY_DAY_WINDOW);
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for t in tasks
        .iter()
        .filter(|t| !is_closed(&t.status) && t.end >= today && t.end < until)
    {
        *counts
            .entry(t.end.date().format("%Y-%m-%d").to_string())
            .or_insert(0) += 1;
    }
    counts
        .into_iter()
        .map(|(date, count)| DayCount { date, count })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLoad {
    pub user_id: String,
    pub role: String,
    pub tasks_in_progress: usize,
    pub total_tasks: usize,
}

pub fn resource_load(resources: &[Resource], tasks: &[Task]) -> Vec<ResourceLoad> {
    let roles: HashMap<&str, &str> = resources
        .iter()
        .map(|r| (r.user_id.as_str(), r.role.as_str()))
        .collect();
    let mut by_user: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for t in tasks.iter().filter(|t| t.is_assigned()) {
        let entry = by_user.entry(t.user.as_str()).or_insert((0, 0));
        if t.status == STATUS_IN_PROGRESS {
            entry.0 += 1;
        }
        entry.1 += 1;
    }
    let mut out: Vec<ResourceLoad> = by_user
        .into_iter()
        .map(|(user, (in_progress, total))| ResourceLoad {
            user_id: user.to_string(),
            role: roles
                .get(user)
                .copied()
                .unwrap_or(DEFAULT_ROLE)
                .to_string(),
            tasks_in_progress: in_progress,
            total_tasks: total,
        })
        .collect();
    out.sort_by(|a, b| {
        b.tasks_in_progress
            .cmp(&a.tasks_in_progress)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("valid date")
    }

    fn task(
        id: &str,
        project: &str,
        status: &str,
        user: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Task {
        Task {
            id: id.into(),
            project: project.into(),
            text: format!("task {}", id),
            status: status.into(),
            start,
            end,
            user: user.into(),
            progress: None,
            extra: Default::default(),
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(14, 30, 0))
            .expect("valid")
    }

    #[test]
    fn summary_metrics_average_uses_positive_completed_spans() {
        let tasks = vec![
            task("T1", "P", "COMPLETED", "N/A", at(2024, 1, 1), at(2024, 1, 10)),
            task("T2", "P", "TO_DO", "N/A", at(2024, 2, 1), at(2024, 2, 5)),
        ];
        let m = summary_metrics(&tasks, now());
        assert_eq!(m.avg_completion_time, 9.0);
        assert_eq!(m.total_tasks, 2);
        assert_eq!(m.completed_tasks, 1);
        assert_eq!(m.completion_rate, 50.0);
        assert_eq!(m.overdue_tasks, 1);
        assert_eq!(m.active_tasks, 1);
    }

    #[test]
    fn summary_metrics_excludes_non_positive_spans() {
        let tasks = vec![
            task("A", "P", "COMPLETED", "u", at(2024, 1, 1), at(2024, 1, 5)),
            task("B", "P", "COMPLETED", "u", at(2024, 1, 5), at(2024, 1, 5)),
            task("C", "P", "COMPLETED", "u", at(2024, 1, 9), at(2024, 1, 2)),
        ];
        let m = summary_metrics(&tasks, now());
        assert_eq!(m.avg_completion_time, 4.0);
    }

    #[test]
    fn summary_metrics_of_empty_set_is_zeroed() {
        assert_eq!(summary_metrics(&[], now()), SummaryMetrics::default());
    }

    #[test]
    fn overdue_days_are_at_least_one() {
        let hour_ago = now() - Duration::hours(1);
        let tasks = vec![
            task("A", "P", "TO_DO", "u", at(2024, 1, 1), hour_ago),
            task("B", "P", "TO_DO", "u", at(2024, 1, 1), at(2024, 3, 10)),
        ];
        let out = annotate_overdue(tasks, now());
        assert_eq!(out[0].days_overdue, 1);
        assert_eq!(out[1].days_overdue, 5);
    }

    #[test]
    fn window_filters_anchor_on_local_midnight() {
        let f = upcoming_filter(now(), 30);
        assert_eq!(f.end_from, Some(at(2024, 3, 15)));
        assert_eq!(f.end_through, Some(at(2024, 4, 14)));
        assert_eq!(f.status_not_in, vec!["COMPLETED".to_string()]);

        let huge = upcoming_filter(now(), i64::MAX);
        assert_eq!(huge.end_from, Some(at(2024, 3, 15)));
        assert_eq!(huge.end_through, None);

        let d = daily_filter(now());
        assert_eq!(d.end_from, Some(at(2024, 3, 15)));
        assert_eq!(d.end_before, Some(at(2024, 3, 16)));

        let o = overdue_filter(now());
        assert_eq!(o.end_before, Some(now()));
    }

    #[test]
    fn gantt_filter_upper_cases_status_only() {
        let f = gantt_filter(&GanttFilters {
            status: Some(" in_progress ".into()),
            user: Some("u1".into()),
            project: Some("Alpha".into()),
        });
        assert_eq!(f.status_eq.as_deref(), Some("IN_PROGRESS"));
        assert_eq!(f.user_eq.as_deref(), Some("u1"));
        assert_eq!(f.project_eq.as_deref(), Some("Alpha"));
    }

    #[test]
    fn gantt_duration_is_never_below_one() {
        let tasks = vec![
            task("A", "P", "TO_DO", "u", at(2024, 1, 1), at(2024, 1, 1)),
            task("B", "P", "TO_DO", "u", at(2024, 1, 9), at(2024, 1, 2)),
            task("C", "P", "TO_DO", "u", at(2024, 1, 1), at(2024, 1, 11)),
        ];
        let rows = gantt_rows(&tasks);
        assert!(rows.iter().all(|r| r.duration_days >= 1));
        assert_eq!(rows[2].duration_days, 10);
        assert_eq!(rows[0].progress, 0.0);
    }

    #[test]
    fn project_rollup_summary_matches_flat_counts() {
        let tasks = vec![
            task("1", "Alpha", "COMPLETED", "a", at(2024, 1, 1), at(2024, 1, 2)),
            task("2", "Alpha", "TO_DO", "a", at(2024, 1, 1), at(2024, 1, 2)),
            task("3", "Alpha", "COMPLETED", "b", at(2024, 1, 1), at(2024, 1, 2)),
            task("4", "Beta", "BLOCKED", "b", at(2024, 1, 1), at(2024, 1, 2)),
            task("5", "Gamma", "COMPLETED", "c", at(2024, 1, 1), at(2024, 1, 2)),
        ];
        let report = project_status_rollup(&tasks);
        let flat_completed = tasks.iter().filter(|t| t.is_completed()).count();

        assert_eq!(report.summary.total_projects, 3);
        assert_eq!(report.summary.total_tasks, tasks.len());
        assert_eq!(report.summary.total_completed, flat_completed);
        assert_eq!(
            report.summary.overall_completion_rate,
            round_1_decimal(completion_rate(flat_completed, tasks.len()))
        );
        for p in &report.projects {
            assert!(p.completed_tasks <= p.total_tasks);
            assert!((0.0..=100.0).contains(&p.completion_rate));
        }

        let alpha = &report.projects[0];
        assert_eq!(alpha.project, "Alpha");
        assert_eq!(
            alpha.statuses,
            vec![
                StatusCount { status: "COMPLETED".into(), count: 2 },
                StatusCount { status: "TO_DO".into(), count: 1 },
            ]
        );
        assert!((alpha.completion_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.summary.avg_completion_rate, 55.56);
    }

    #[test]
    fn empty_rollup_has_zero_summary() {
        let report = project_status_rollup(&[]);
        assert!(report.projects.is_empty());
        assert_eq!(report.summary.overall_completion_rate, 0.0);
        assert_eq!(report.summary.avg_completion_rate, 0.0);
    }

    #[test]
    fn workload_sorts_by_total_and_relabels_unassigned() {
        let d = at(2024, 1, 1);
        let tasks = vec![
            task("1", "P", "TO_DO", "N/A", d, d),
            task("2", "P", "IN_PROGRESS", "N/A", d, d),
            task("3", "P", "BLOCKED", "zoe", d, d),
            task("4", "P", "COMPLETED", "amy", d, d),
            task("5", "P", "TO_DO", "amy", d, d),
        ];
        let rows = workload_rollup(&tasks);
        assert_eq!(rows[0].raw_user_id, "N/A");
        assert_eq!(rows[0].display_user_id, "Unassigned");
        assert_eq!((rows[0].to_do, rows[0].in_progress), (1, 1));
        assert_eq!(rows[1].raw_user_id, "amy");
        assert_eq!(rows[1].total_tasks, 2);
        assert_eq!(rows[2].raw_user_id, "zoe");
        assert_eq!(rows[2].blocked, 1);
    }

    #[test]
    fn scoreboard_orders_by_rate_then_overdue_then_user() {
        let past = at(2024, 1, 1);
        let future = at(2024, 12, 1);
        let tasks = vec![
            // bob: 1/2 completed, one overdue
            task("1", "P", "COMPLETED", "bob", past, past),
            task("2", "P", "TO_DO", "bob", past, past),
            // ann: 1/2 completed, none overdue
            task("3", "P", "COMPLETED", "ann", past, past),
            task("4", "P", "TO_DO", "ann", past, future),
            // cat: 1/2 completed, none overdue (cancelled is not overdue)
            task("5", "P", "COMPLETED", "cat", past, past),
            task("6", "P", "CANCELLED", "cat", past, past),
            // dan: 0/1
            task("7", "P", "IN_PROGRESS", "dan", past, future),
            // eve: 1/1
            task("8", "P", "COMPLETED", "eve", past, past),
        ];
        let rows = efficiency_scoreboard(workload_rollup(&tasks), &tasks, now());
        let order: Vec<&str> = rows
            .iter()
            .map(|r| r.workload.raw_user_id.as_str())
            .collect();
        assert_eq!(order, vec!["eve", "ann", "cat", "bob", "dan"]);

        for pair in rows.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let ok = a.completion_rate > b.completion_rate
                || (a.completion_rate == b.completion_rate && a.overdue_tasks < b.overdue_tasks)
                || (a.completion_rate == b.completion_rate
                    && a.overdue_tasks == b.overdue_tasks
                    && a.workload.raw_user_id <= b.workload.raw_user_id);
            assert!(ok, "{:?} before {:?}", a, b);
        }
        let bob = rows.iter().find(|r| r.workload.raw_user_id == "bob").expect("bob");
        assert_eq!(bob.overdue_tasks, 1);
        assert_eq!(bob.completion_rate, 50.0);
    }

    #[test]
    fn status_distribution_fills_known_statuses() {
        let d = at(2024, 1, 1);
        let tasks = vec![
            task("1", "P", "TO_DO", "u", d, d),
            task("2", "P", "TO_DO", "u", d, d),
            task("3", "P", "REVIEW", "u", d, d),
        ];
        let dist = status_distribution(&tasks);
        assert_eq!(dist.len(), 6);
        assert_eq!(dist[0], StatusCount { status: "TO_DO".into(), count: 2 });
        assert_eq!(dist[1], StatusCount { status: "REVIEW".into(), count: 1 });
        assert!(dist.iter().any(|s| s.status == "CANCELLED" && s.count == 0));
    }

    #[test]
    fn upcoming_by_day_buckets_the_next_week() {
        let tasks = vec![
            task("1", "P", "TO_DO", "u", at(2024, 3, 1), at(2024, 3, 15)),
            task("2", "P", "TO_DO", "u", at(2024, 3, 1), at(2024, 3, 15) + Duration::hours(20)),
            task("3", "P", "CANCELLED", "u", at(2024, 3, 1), at(2024, 3, 16)),
            task("4", "P", "BLOCKED", "u", at(2024, 3, 1), at(2024, 3, 21)),
            task("5", "P", "BLOCKED", "u", at(2024, 3, 1), at(2024, 3, 22)),
        ];
        assert_eq!(
            upcoming_by_day(&tasks, now()),
            vec![
                DayCount { date: "2024-03-15".into(), count: 2 },
                DayCount { date: "2024-03-21".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn overdue_by_user_skips_closed_work() {
        let past = at(2024, 1, 1);
        let tasks = vec![
            task("1", "P", "TO_DO", "amy", past, past),
            task("2", "P", "CANCELLED", "amy", past, past),
            task("3", "P", "BLOCKED", "N/A", past, past),
            task("4", "P", "BLOCKED", "N/A", past, past),
        ];
        let out = overdue_by_user(&tasks, now());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].user_id, "N/A");
        assert_eq!(out[0].display_user_id, "Unassigned");
        assert_eq!(out[0].overdue_count, 2);
        assert_eq!(out[1].overdue_count, 1);
    }

    #[test]
    fn resource_load_attaches_roles() {
        let d = at(2024, 1, 1);
        let tasks = vec![
            task("1", "P", "IN_PROGRESS", "amy", d, d),
            task("2", "P", "TO_DO", "amy", d, d),
            task("3", "P", "IN_PROGRESS", "bo", d, d),
            task("4", "P", "IN_PROGRESS", "bo", d, d),
            task("5", "P", "IN_PROGRESS", "N/A", d, d),
        ];
        let resources = vec![Resource {
            user_id: "amy".into(),
            role: "lead".into(),
            updated_at: "t".into(),
        }];
        let out = resource_load(&resources, &tasks);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].user_id, "bo");
        assert_eq!(out[0].role, "team_member");
        assert_eq!(out[1].role, "lead");
        assert_eq!((out[1].tasks_in_progress, out[1].total_tasks), (1, 2));
    }
}
