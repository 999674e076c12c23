use crate::db;
use crate::ipc::error::{calc_err, db_err, err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "settings": state.settings }))
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(patch) = req.params.get("settings") else {
        return err(&req.id, "bad_params", "missing settings", None);
    };
    let next = match state.settings.merged(patch) {
        Ok(s) => s,
        Err(e) => return calc_err(&req.id, e),
    };

    // Without a workspace the change lasts for this process only.
    if let Some(conn) = state.db.as_ref() {
        if let Err(e) = db::save_calc_settings(conn, &next) {
            return db_err(&req.id, "db_update_failed", e);
        }
    }
    state.settings = next;
    ok(
        &req.id,
        json!({ "settings": state.settings, "persisted": state.db.is_some() }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.update" => Some(handle_settings_update(state, req)),
        _ => None,
    }
}
