use rusqlite::Connection;
use serde::de::DeserializeOwned;

use crate::db::SqliteSource;
use crate::ipc::error::{db_err, err};
use crate::ipc::types::{AppState, Request};
use crate::model::{Assessment, Course, CourseSource};

/// Error arm of every helper: an already-built response.
pub type Reply<T> = Result<T, serde_json::Value>;

pub fn require_db<'a>(state: &'a AppState, req: &Request) -> Reply<&'a Connection> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str<'a>(req: &'a Request, key: &str) -> Reply<&'a str> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(err(&req.id, "bad_params", format!("missing {key}"), None)),
    }
}

pub fn optional_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Deserialize `params[key]` into `T`.
pub fn parse_param<T: DeserializeOwned>(req: &Request, key: &str) -> Reply<T> {
    let Some(raw) = req.params.get(key) else {
        return Err(err(&req.id, "bad_params", format!("missing {key}"), None));
    };
    serde_json::from_value(raw.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("invalid {key}: {e}"), None))
}

/// Like [`parse_param`] but absent or null yields `None`.
pub fn parse_optional_param<T: DeserializeOwned>(req: &Request, key: &str) -> Reply<Option<T>> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(_) => parse_param(req, key).map(Some),
    }
}

/// Number that may legitimately be missing; null or non-numeric reads as
/// NaN so the converters fall back to their no-grade value.
pub fn lenient_f64(req: &Request, key: &str) -> f64 {
    req.params
        .get(key)
        .and_then(|v| v.as_f64())
        .unwrap_or(f64::NAN)
}

pub fn load_course_snapshot(
    state: &AppState,
    req: &Request,
    course_id: &str,
) -> Reply<(Course, Vec<Assessment>)> {
    let conn = require_db(state, req)?;
    let source = SqliteSource { conn };
    let course = match source.course(course_id) {
        Ok(Some(c)) => c,
        Ok(None) => return Err(err(&req.id, "not_found", "course not found", None)),
        Err(e) => return Err(db_err(&req.id, "db_query_failed", e)),
    };
    let assessments = source
        .assessments(course_id)
        .map_err(|e| db_err(&req.id, "db_query_failed", e))?;
    Ok((course, assessments))
}

/// Course plus assessments, either inline (`course`, `assessments`) or
/// looked up from the workspace by `courseId`.
pub fn resolve_course(state: &AppState, req: &Request) -> Reply<(Course, Vec<Assessment>)> {
    if req.params.get("course").is_some() {
        let course: Course = parse_param(req, "course")?;
        let assessments: Vec<Assessment> =
            parse_optional_param(req, "assessments")?.unwrap_or_default();
        return Ok((course, assessments));
    }
    let course_id = required_str(req, "courseId")?;
    load_course_snapshot(state, req, course_id)
}

/// Fill in a fresh id when `obj[key]` is absent or blank.
pub fn ensure_id(obj: &mut serde_json::Value, key: &str) {
    let blank = obj
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().is_empty())
        .unwrap_or(true);
    if blank {
        if let Some(map) = obj.as_object_mut() {
            map.insert(
                key.to_string(),
                serde_json::Value::String(uuid::Uuid::new_v4().to_string()),
            );
        }
    }
}
