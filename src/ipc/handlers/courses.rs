use crate::calc::course::{course_grade, validate_category_weights};
use crate::db::{self, SqliteSource};
use crate::ipc::error::{calc_err, db_err, err, ok};
use crate::ipc::helpers::{ensure_id, load_course_snapshot, require_db, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{Course, CourseSource};
use serde_json::json;

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "courses": [] }));
    };
    let source = SqliteSource { conn };

    let courses = match source.courses() {
        Ok(c) => c,
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };

    // Include the current grade so the dashboard does not need a second call.
    let mut rows = Vec::with_capacity(courses.len());
    for c in &courses {
        let assessments = match source.assessments(&c.id) {
            Ok(a) => a,
            Err(e) => return db_err(&req.id, "db_query_failed", e),
        };
        let grade = course_grade(c, &assessments);
        rows.push(json!({
            "course": c,
            "assessmentCount": assessments.len(),
            "success": grade.success,
            "courseGrade": grade.course_grade,
            "display": grade.display,
        }));
    }
    ok(&req.id, json!({ "courses": rows }))
}

fn handle_courses_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (course, assessments) = match load_course_snapshot(state, req, course_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let grade = course_grade(&course, &assessments);
    ok(
        &req.id,
        json!({ "course": course, "assessments": assessments, "grade": grade }),
    )
}

fn check_course_fields(course: &Course) -> Result<(), String> {
    if course.name.trim().is_empty() {
        return Err("course name must not be empty".to_string());
    }
    if let Some(ch) = course.credit_hours {
        if !ch.is_finite() || ch <= 0.0 {
            return Err("creditHours must be a positive number".to_string());
        }
    }
    if !course.max_points.is_finite() || course.max_points <= 0.0 {
        return Err("maxPoints must be a positive number".to_string());
    }
    if let Some(dup) = course
        .categories
        .iter()
        .enumerate()
        .find(|(i, c)| course.categories[..*i].iter().any(|o| o.id == c.id))
        .map(|(_, c)| c.id.clone())
    {
        return Err(format!("duplicate category id: {dup}"));
    }
    Ok(())
}

fn handle_courses_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let Some(raw) = req.params.get("course") else {
        return err(&req.id, "bad_params", "missing course", None);
    };

    let mut raw = raw.clone();
    if !raw.is_object() {
        return err(&req.id, "bad_params", "course must be an object", None);
    }
    ensure_id(&mut raw, "id");
    if let Some(cats) = raw.get_mut("categories").and_then(|v| v.as_array_mut()) {
        for c in cats.iter_mut() {
            ensure_id(c, "id");
        }
    }

    let course: Course = match serde_json::from_value(raw) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "bad_params", format!("invalid course: {e}"), None),
    };
    if let Err(msg) = check_course_fields(&course) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = validate_category_weights(&course) {
        return calc_err(&req.id, e);
    }

    if let Err(e) = db::save_course(conn, &course) {
        return db_err(&req.id, "db_update_failed", e);
    }
    tracing::debug!(course = %course.id, categories = course.categories.len(), "course saved");
    ok(&req.id, json!({ "courseId": course.id, "course": course }))
}

fn handle_courses_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match db::delete_course(conn, course_id) {
        Ok(true) => ok(&req.id, json!({ "ok": true })),
        Ok(false) => err(&req.id, "not_found", "course not found", None),
        Err(e) => db_err(&req.id, "db_delete_failed", e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.get" => Some(handle_courses_get(state, req)),
        "courses.save" => Some(handle_courses_save(state, req)),
        "courses.delete" => Some(handle_courses_delete(state, req)),
        _ => None,
    }
}
