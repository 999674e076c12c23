use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;

use crate::config::{CalcSettings, SETTINGS_KEY};
use crate::model::{
    Assessment, Category, Course, CourseSource, GpaScale, Goal, GradingScale, MissingPolicy,
};

pub const DB_FILE_NAME: &str = "gradecore.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            credit_hours REAL,
            grading_scale TEXT NOT NULL DEFAULT 'percentage',
            max_points REAL NOT NULL DEFAULT 100,
            gpa_scale TEXT NOT NULL DEFAULT '4.0',
            handle_missing TEXT NOT NULL DEFAULT 'exclude',
            target_grade TEXT,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS categories(
            id TEXT NOT NULL,
            course_id TEXT NOT NULL,
            name TEXT NOT NULL,
            weight REAL NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(course_id, id),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_categories_course ON categories(course_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessments(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            category_id TEXT NOT NULL,
            name TEXT NOT NULL,
            max_score REAL NOT NULL,
            score REAL,
            is_extra_credit INTEGER NOT NULL DEFAULT 0,
            extra_credit_points REAL NOT NULL DEFAULT 0,
            date TEXT,
            note TEXT,
            assessment_type TEXT,
            updated_at TEXT,
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(course_id, category_id) REFERENCES categories(course_id, id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_course ON assessments(course_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_category ON assessments(course_id, category_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS goals(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            target_grade TEXT NOT NULL,
            note TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_goals_course ON goals(course_id)",
        [],
    )?;

    Ok(conn)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Stored settings, or defaults when absent. A stored blob that no longer
/// parses or validates is ignored rather than blocking the workspace.
pub fn load_calc_settings(conn: &Connection) -> anyhow::Result<CalcSettings> {
    let Some(v) = settings_get_json(conn, SETTINGS_KEY)? else {
        return Ok(CalcSettings::default());
    };
    match serde_json::from_value::<CalcSettings>(v) {
        Ok(s) if s.validate().is_ok() => Ok(s),
        Ok(_) | Err(_) => {
            tracing::warn!(key = SETTINGS_KEY, "stored settings invalid; using defaults");
            Ok(CalcSettings::default())
        }
    }
}

pub fn save_calc_settings(conn: &Connection, settings: &CalcSettings) -> anyhow::Result<()> {
    settings_set_json(conn, SETTINGS_KEY, &serde_json::to_value(settings)?)
}

fn course_from_row(r: &Row<'_>) -> rusqlite::Result<Course> {
    let grading_scale: String = r.get(3)?;
    let gpa_scale: String = r.get(5)?;
    let handle_missing: String = r.get(6)?;
    Ok(Course {
        id: r.get(0)?,
        name: r.get(1)?,
        credit_hours: r.get(2)?,
        grading_scale: GradingScale::parse(&grading_scale).unwrap_or_default(),
        max_points: r.get(4)?,
        gpa_scale: GpaScale::parse(&gpa_scale).unwrap_or_default(),
        handle_missing: MissingPolicy::parse(&handle_missing).unwrap_or_default(),
        target_grade: r.get(7)?,
        categories: Vec::new(),
    })
}

const COURSE_COLUMNS: &str = "id, name, credit_hours, grading_scale, max_points, gpa_scale, handle_missing, target_grade";

fn load_categories(conn: &Connection, course_id: &str) -> anyhow::Result<Vec<Category>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, weight
         FROM categories
         WHERE course_id = ?
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([course_id], |r| {
            Ok(Category {
                id: r.get(0)?,
                name: r.get(1)?,
                weight: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_course(conn: &Connection, course_id: &str) -> anyhow::Result<Option<Course>> {
    let sql = format!("SELECT {} FROM courses WHERE id = ?", COURSE_COLUMNS);
    let course = conn
        .query_row(&sql, [course_id], course_from_row)
        .optional()?;
    let Some(mut course) = course else {
        return Ok(None);
    };
    course.categories = load_categories(conn, course_id)?;
    Ok(Some(course))
}

pub fn list_courses(conn: &Connection) -> anyhow::Result<Vec<Course>> {
    let sql = format!("SELECT {} FROM courses ORDER BY name, id", COURSE_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let mut courses = stmt
        .query_map([], course_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    for c in &mut courses {
        c.categories = load_categories(conn, &c.id)?;
    }
    Ok(courses)
}

/// Upsert a course and replace its category list. Category ids are scoped
/// to the course, so two courses may both use `hw`. Assessments whose
/// category disappears are deleted with it, as the remote store does.
pub fn save_course(conn: &Connection, course: &Course) -> anyhow::Result<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute(
        "INSERT INTO courses(id, name, credit_hours, grading_scale, max_points, gpa_scale, handle_missing, target_grade, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           name = excluded.name,
           credit_hours = excluded.credit_hours,
           grading_scale = excluded.grading_scale,
           max_points = excluded.max_points,
           gpa_scale = excluded.gpa_scale,
           handle_missing = excluded.handle_missing,
           target_grade = excluded.target_grade,
           updated_at = excluded.updated_at",
        (
            &course.id,
            &course.name,
            course.credit_hours,
            course.grading_scale.as_str(),
            course.max_points,
            course.gpa_scale.as_str(),
            course.handle_missing.as_str(),
            &course.target_grade,
            now_rfc3339(),
        ),
    )?;

    let keep: Vec<&str> = course.categories.iter().map(|c| c.id.as_str()).collect();
    let existing: Vec<String> = {
        let mut stmt = tx.prepare("SELECT id FROM categories WHERE course_id = ?")?;
        let ids = stmt
            .query_map([&course.id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        ids
    };
    for old in existing.iter().filter(|id| !keep.contains(&id.as_str())) {
        tx.execute(
            "DELETE FROM assessments WHERE course_id = ? AND category_id = ?",
            (&course.id, old),
        )?;
        tx.execute(
            "DELETE FROM categories WHERE course_id = ? AND id = ?",
            (&course.id, old),
        )?;
    }

    for (i, c) in course.categories.iter().enumerate() {
        tx.execute(
            "INSERT INTO categories(id, course_id, name, weight, sort_order)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(course_id, id) DO UPDATE SET
               name = excluded.name,
               weight = excluded.weight,
               sort_order = excluded.sort_order",
            (&c.id, &course.id, &c.name, c.weight, i as i64),
        )?;
    }

    tx.commit()?;
    Ok(())
}

/// Returns false when the course did not exist.
pub fn delete_course(conn: &Connection, course_id: &str) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    // Dependency order; there is no ON DELETE CASCADE.
    tx.execute("DELETE FROM goals WHERE course_id = ?", [course_id])?;
    tx.execute("DELETE FROM assessments WHERE course_id = ?", [course_id])?;
    tx.execute("DELETE FROM categories WHERE course_id = ?", [course_id])?;
    let n = tx.execute("DELETE FROM courses WHERE id = ?", [course_id])?;
    tx.commit()?;
    Ok(n > 0)
}

fn assessment_from_row(r: &Row<'_>) -> rusqlite::Result<Assessment> {
    let date: Option<String> = r.get(7)?;
    Ok(Assessment {
        id: r.get(0)?,
        category_id: r.get(1)?,
        name: r.get(2)?,
        max_score: r.get(3)?,
        score: r.get(4)?,
        is_extra_credit: r.get::<_, i64>(5)? != 0,
        extra_credit_points: r.get(6)?,
        date: date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
        note: r.get(8)?,
        assessment_type: r.get(9)?,
    })
}

pub fn list_assessments(conn: &Connection, course_id: &str) -> anyhow::Result<Vec<Assessment>> {
    let mut stmt = conn.prepare(
        "SELECT id, category_id, name, max_score, score, is_extra_credit, extra_credit_points, date, note, assessment_type
         FROM assessments
         WHERE course_id = ?
         ORDER BY date IS NULL, date, rowid",
    )?;
    let rows = stmt
        .query_map([course_id], assessment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Upsert an assessment under `course_id`. Returns false, writing nothing,
/// when the id already belongs to another course.
pub fn save_assessment(conn: &Connection, course_id: &str, a: &Assessment) -> anyhow::Result<bool> {
    let n = conn.execute(
        "INSERT INTO assessments(id, course_id, category_id, name, max_score, score, is_extra_credit, extra_credit_points, date, note, assessment_type, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           category_id = excluded.category_id,
           name = excluded.name,
           max_score = excluded.max_score,
           score = excluded.score,
           is_extra_credit = excluded.is_extra_credit,
           extra_credit_points = excluded.extra_credit_points,
           date = excluded.date,
           note = excluded.note,
           assessment_type = excluded.assessment_type,
           updated_at = excluded.updated_at
         WHERE assessments.course_id = excluded.course_id",
        rusqlite::params![
            &a.id,
            course_id,
            &a.category_id,
            &a.name,
            a.max_score,
            a.score,
            a.is_extra_credit as i64,
            a.extra_credit_points,
            a.date.map(|d| d.format("%Y-%m-%d").to_string()),
            &a.note,
            &a.assessment_type,
            now_rfc3339(),
        ],
    )?;
    Ok(n > 0)
}

pub fn delete_assessment(conn: &Connection, assessment_id: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM assessments WHERE id = ?", [assessment_id])?;
    Ok(n > 0)
}

fn goal_from_row(r: &Row<'_>) -> rusqlite::Result<Goal> {
    Ok(Goal {
        id: r.get(0)?,
        course_id: r.get(1)?,
        target_grade: r.get(2)?,
        note: r.get(3)?,
        created_at: r.get(4)?,
        updated_at: r.get(5)?,
    })
}

pub fn list_goals(conn: &Connection, course_id: Option<&str>) -> anyhow::Result<Vec<Goal>> {
    let mut stmt = conn.prepare(
        "SELECT id, course_id, target_grade, note, created_at, updated_at
         FROM goals
         WHERE ?1 IS NULL OR course_id = ?1
         ORDER BY created_at, id",
    )?;
    let rows = stmt
        .query_map([course_id], goal_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_goal(conn: &Connection, goal_id: &str) -> anyhow::Result<Option<Goal>> {
    let goal = conn
        .query_row(
            "SELECT id, course_id, target_grade, note, created_at, updated_at
             FROM goals WHERE id = ?",
            [goal_id],
            goal_from_row,
        )
        .optional()?;
    Ok(goal)
}

/// Upsert; `created_at` is kept from the first save.
pub fn save_goal(conn: &Connection, goal: &Goal) -> anyhow::Result<Goal> {
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO goals(id, course_id, target_grade, note, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           course_id = excluded.course_id,
           target_grade = excluded.target_grade,
           note = excluded.note,
           updated_at = excluded.updated_at",
        (
            &goal.id,
            &goal.course_id,
            &goal.target_grade,
            &goal.note,
            &now,
            &now,
        ),
    )?;
    load_goal(conn, &goal.id)?.ok_or_else(|| anyhow::anyhow!("goal vanished after save"))
}

pub fn delete_goal(conn: &Connection, goal_id: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM goals WHERE id = ?", [goal_id])?;
    Ok(n > 0)
}

/// Workspace-backed [`CourseSource`].
pub struct SqliteSource<'a> {
    pub conn: &'a Connection,
}

impl CourseSource for SqliteSource<'_> {
    fn course(&self, course_id: &str) -> anyhow::Result<Option<Course>> {
        load_course(self.conn, course_id)
    }

    fn courses(&self) -> anyhow::Result<Vec<Course>> {
        list_courses(self.conn)
    }

    fn assessments(&self, course_id: &str) -> anyhow::Result<Vec<Assessment>> {
        list_assessments(self.conn, course_id)
    }
}
