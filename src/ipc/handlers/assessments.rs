use crate::db;
use crate::ipc::error::{db_err, err, ok};
use crate::ipc::helpers::{ensure_id, load_course_snapshot, require_db, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Assessment;
use serde_json::json;

fn handle_assessments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match load_course_snapshot(state, req, course_id) {
        Ok((_, assessments)) => ok(&req.id, json!({ "assessments": assessments })),
        Err(resp) => resp,
    }
}

/// Store-side checks. The aggregators cope with bad numbers on their own,
/// but nothing malformed should be written in the first place.
fn check_assessment(a: &Assessment) -> Result<(), String> {
    if !a.max_score.is_finite() || a.max_score <= 0.0 {
        return Err("maxScore must be a positive number".to_string());
    }
    if let Some(score) = a.score {
        if !score.is_finite() || score < 0.0 || score > a.max_score {
            return Err("score must be between 0 and maxScore".to_string());
        }
    }
    if !a.extra_credit_points.is_finite() || a.extra_credit_points < 0.0 {
        return Err("extraCreditPoints must be zero or more".to_string());
    }
    Ok(())
}

fn handle_assessments_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(raw) = req.params.get("assessment") else {
        return err(&req.id, "bad_params", "missing assessment", None);
    };
    let mut raw = raw.clone();
    if !raw.is_object() {
        return err(&req.id, "bad_params", "assessment must be an object", None);
    }
    ensure_id(&mut raw, "id");
    let assessment: Assessment = match serde_json::from_value(raw) {
        Ok(a) => a,
        Err(e) => {
            return err(
                &req.id,
                "bad_params",
                format!("invalid assessment: {e}"),
                None,
            )
        }
    };
    if let Err(msg) = check_assessment(&assessment) {
        return err(&req.id, "bad_params", msg, None);
    }

    let course = match db::load_course(conn, course_id) {
        Ok(Some(c)) => c,
        Ok(None) => return err(&req.id, "not_found", "course not found", None),
        Err(e) => return db_err(&req.id, "db_query_failed", e),
    };
    if !course
        .categories
        .iter()
        .any(|c| c.id == assessment.category_id)
    {
        return err(
            &req.id,
            "not_found",
            "category not found in course",
            Some(json!({ "categoryId": assessment.category_id })),
        );
    }

    match db::save_assessment(conn, course_id, &assessment) {
        Ok(true) => {}
        Ok(false) => {
            return err(
                &req.id,
                "conflict",
                "assessment id belongs to another course",
                Some(json!({ "assessmentId": assessment.id })),
            )
        }
        Err(e) => return db_err(&req.id, "db_update_failed", e),
    }
    ok(
        &req.id,
        json!({ "assessmentId": assessment.id, "assessment": assessment }),
    )
}

fn handle_assessments_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let assessment_id = match required_str(req, "assessmentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match db::delete_assessment(conn, assessment_id) {
        Ok(true) => ok(&req.id, json!({ "ok": true })),
        Ok(false) => err(&req.id, "not_found", "assessment not found", None),
        Err(e) => db_err(&req.id, "db_delete_failed", e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assessments.list" => Some(handle_assessments_list(state, req)),
        "assessments.save" => Some(handle_assessments_save(state, req)),
        "assessments.delete" => Some(handle_assessments_delete(state, req)),
        _ => None,
    }
}
