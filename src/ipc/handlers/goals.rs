use crate::calc::goal::{analyze_goal_feasibility, parse_target};
use crate::db;
use crate::ipc::error::{calc_err, db_err, err, ok};
use crate::ipc::helpers::{ensure_id, load_course_snapshot, optional_str, require_db, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Goal;
use serde_json::json;

fn handle_goals_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "goals": [] }));
    };
    match db::list_goals(conn, optional_str(req, "courseId")) {
        Ok(goals) => ok(&req.id, json!({ "goals": goals })),
        Err(e) => db_err(&req.id, "db_query_failed", e),
    }
}

fn handle_goals_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Some(raw) = req.params.get("goal") else {
        return err(&req.id, "bad_params", "missing goal", None);
    };
    let mut raw = raw.clone();
    if !raw.is_object() {
        return err(&req.id, "bad_params", "goal must be an object", None);
    }
    ensure_id(&mut raw, "id");
    let goal: Goal = match serde_json::from_value(raw) {
        Ok(g) => g,
        Err(e) => return err(&req.id, "bad_params", format!("invalid goal: {e}"), None),
    };

    let course = match db::load_course(conn, &goal.course_id) {
        Ok(Some(c)) => c,
        Ok(None) => return err(&req.id, "not_found", "course not found", None),
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };
    // Refuse targets that could never be analysed later.
    if let Err(e) = parse_target(&goal.target_grade, course.gpa_scale) {
        return calc_err(&req.id, e);
    }

    match db::save_goal(conn, &goal) {
        Ok(saved) => ok(&req.id, json!({ "goalId": saved.id, "goal": saved })),
        Err(e) => db_err(&req.id, "db_update_failed", e),
    }
}

fn handle_goals_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let goal_id = match required_str(req, "goalId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match db::delete_goal(conn, goal_id) {
        Ok(true) => ok(&req.id, json!({ "ok": true })),
        Ok(false) => err(&req.id, "not_found", "goal not found", None),
        Err(e) => db_err(&req.id, "db_delete_failed", e),
    }
}

fn handle_goals_analyze(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let goal_id = match required_str(req, "goalId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let goal = match db::load_goal(conn, goal_id) {
        Ok(Some(g)) => g,
        Ok(None) => return err(&req.id, "not_found", "goal not found", None),
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };
    let (course, assessments) = match load_course_snapshot(state, req, &goal.course_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let analysis = analyze_goal_feasibility(
        &course,
        &goal.target_grade,
        &assessments,
        &state.settings.thresholds,
    );
    ok(&req.id, json!({ "goal": goal, "analysis": analysis }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "goals.list" => Some(handle_goals_list(state, req)),
        "goals.save" => Some(handle_goals_save(state, req)),
        "goals.delete" => Some(handle_goals_delete(state, req)),
        "goals.analyze" => Some(handle_goals_analyze(state, req)),
        _ => None,
    }
}
