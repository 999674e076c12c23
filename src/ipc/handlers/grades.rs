use std::collections::HashMap;

use crate::calc::category::category_average;
use crate::calc::course::course_grade;
use crate::calc::goal::analyze_goal_feasibility;
use crate::calc::program::update_cgpa;
use crate::calc::scale::{
    format_scale_value, gpa_to_percentage, percentage_to_gpa, percentage_to_letter,
    percentage_to_scale,
};
use crate::db::SqliteSource;
use crate::ipc::error::{db_err, err, ok};
use crate::ipc::helpers::{
    lenient_f64, optional_str, parse_optional_param, parse_param, resolve_course, Reply,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Assessment, Course, CourseSource, GpaScale, GradingScale, MissingPolicy};
use serde_json::json;

fn gpa_scale_param(req: &Request) -> Reply<GpaScale> {
    match optional_str(req, "gpaScale") {
        None => Ok(GpaScale::default()),
        Some(s) => GpaScale::parse(s).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("unknown gpaScale: {s}"),
                Some(json!({ "allowed": ["4.0", "5.0", "inverted-4.0", "inverted-5.0"] })),
            )
        }),
    }
}

fn handle_percentage_to_scale(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let scale = match optional_str(req, "scale") {
        None => GradingScale::default(),
        Some(s) => match GradingScale::parse(s) {
            Some(v) => v,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown scale: {s}"),
                    Some(json!({ "allowed": ["percentage", "points", "gpa"] })),
                )
            }
        },
    };
    let gpa_scale = match gpa_scale_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let percentage = lenient_f64(req, "percentage");
    let max_points = req
        .params
        .get("maxPoints")
        .and_then(|v| v.as_f64())
        .unwrap_or(100.0);

    ok(
        &req.id,
        json!({
            "value": percentage_to_scale(percentage, scale, max_points, gpa_scale),
            "text": format_scale_value(percentage, scale, max_points, gpa_scale),
            "letter": percentage_to_letter(percentage),
        }),
    )
}

fn handle_percentage_to_gpa(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let gpa_scale = match gpa_scale_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let percentage = lenient_f64(req, "percentage");
    ok(
        &req.id,
        json!({ "gpa": percentage_to_gpa(percentage, gpa_scale), "gpaScale": gpa_scale }),
    )
}

fn handle_gpa_to_percentage(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let gpa_scale = match gpa_scale_param(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let gpa = lenient_f64(req, "gpa");
    ok(
        &req.id,
        json!({
            "percentage": gpa_to_percentage(gpa, gpa_scale),
            "gpaScale": gpa_scale,
            "approximate": true,
        }),
    )
}

fn handle_category_average(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let assessments: Vec<Assessment> = match parse_param(req, "assessments") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let policy = match optional_str(req, "handleMissing") {
        None => MissingPolicy::default(),
        Some(s) => match MissingPolicy::parse(s) {
            Some(p) => p,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown handleMissing: {s}"),
                    None,
                )
            }
        },
    };
    let avg = category_average(&assessments, policy);
    ok(&req.id, json!(avg))
}

fn handle_course_grade(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (course, assessments) = match resolve_course(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    ok(&req.id, json!(course_grade(&course, &assessments)))
}

fn handle_cgpa(state: &mut AppState, req: &Request) -> serde_json::Value {
    let default_credit_hours = state.settings.default_credit_hours;

    let inline: Option<Vec<Course>> = match parse_optional_param(req, "courses") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (courses, by_course) = match inline {
        Some(courses) => {
            let by_course: HashMap<String, Vec<Assessment>> =
                match parse_optional_param(req, "assessmentsByCourse") {
                    Ok(v) => v.unwrap_or_default(),
                    Err(resp) => return resp,
                };
            (courses, by_course)
        }
        None => {
            let Some(conn) = state.db.as_ref() else {
                return err(
                    &req.id,
                    "no_workspace",
                    "pass courses inline or select a workspace first",
                    None,
                );
            };
            let source = SqliteSource { conn };
            let courses = match source.courses() {
                Ok(c) => c,
                Err(e) => return db_err(&req.id, "db_query_failed", e),
            };
            let mut by_course = HashMap::new();
            for c in &courses {
                match source.assessments(&c.id) {
                    Ok(a) => {
                        by_course.insert(c.id.clone(), a);
                    }
                    Err(e) => return db_err(&req.id, "db_query_failed", e),
                }
            }
            (courses, by_course)
        }
    };

    ok(
        &req.id,
        json!(update_cgpa(&courses, &by_course, default_credit_hours)),
    )
}

fn handle_goal_feasibility(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (course, assessments) = match resolve_course(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let target = optional_str(req, "targetGrade")
        .map(str::to_string)
        .or_else(|| course.target_grade.clone());
    let Some(target) = target else {
        return err(
            &req.id,
            "bad_params",
            "missing targetGrade and the course has no target set",
            None,
        );
    };

    let analysis = analyze_goal_feasibility(
        &course,
        &target,
        &assessments,
        &state.settings.thresholds,
    );
    ok(&req.id, json!(analysis))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calc.percentageToScale" => Some(handle_percentage_to_scale(state, req)),
        "calc.percentageToGpa" => Some(handle_percentage_to_gpa(state, req)),
        "calc.gpaToPercentage" => Some(handle_gpa_to_percentage(state, req)),
        "calc.categoryAverage" => Some(handle_category_average(state, req)),
        "calc.courseGrade" => Some(handle_course_grade(state, req)),
        "calc.cgpa" => Some(handle_cgpa(state, req)),
        "calc.goalFeasibility" => Some(handle_goal_feasibility(state, req)),
        _ => None,
    }
}
