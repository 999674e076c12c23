use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradingScale {
    #[default]
    Percentage,
    Points,
    Gpa,
}

impl GradingScale {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradingScale::Percentage => "percentage",
            GradingScale::Points => "points",
            GradingScale::Gpa => "gpa",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "percentage" => Some(GradingScale::Percentage),
            "points" => Some(GradingScale::Points),
            "gpa" => Some(GradingScale::Gpa),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GpaScale {
    #[default]
    #[serde(rename = "4.0", alias = "4")]
    Four,
    #[serde(rename = "5.0", alias = "5")]
    Five,
    #[serde(rename = "inverted-4.0", alias = "inverted-4")]
    InvertedFour,
    #[serde(rename = "inverted-5.0", alias = "inverted-5")]
    InvertedFive,
}

impl GpaScale {
    pub fn as_str(&self) -> &'static str {
        match self {
            GpaScale::Four => "4.0",
            GpaScale::Five => "5.0",
            GpaScale::InvertedFour => "inverted-4.0",
            GpaScale::InvertedFive => "inverted-5.0",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "4.0" | "4" => Some(GpaScale::Four),
            "5.0" | "5" => Some(GpaScale::Five),
            "inverted-4.0" | "inverted-4" => Some(GpaScale::InvertedFour),
            "inverted-5.0" | "inverted-5" => Some(GpaScale::InvertedFive),
            _ => None,
        }
    }

    /// Top of the numeric range, e.g. 4.0 for both `4.0` and `inverted-4.0`.
    pub fn max(&self) -> f64 {
        match self {
            GpaScale::Four | GpaScale::InvertedFour => 4.0,
            GpaScale::Five | GpaScale::InvertedFive => 5.0,
        }
    }
}

/// Course-level policy for assessments that have no score yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    #[default]
    Exclude,
    Zero,
}

impl MissingPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingPolicy::Exclude => "exclude",
            MissingPolicy::Zero => "zero",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclude" => Some(MissingPolicy::Exclude),
            "zero" => Some(MissingPolicy::Zero),
            _ => None,
        }
    }
}

fn default_max_points() -> f64 {
    100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    #[serde(default)]
    pub id: String,
    pub category_id: String,
    pub max_score: f64,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub is_extra_credit: bool,
    #[serde(default)]
    pub extra_credit_points: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub assessment_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub credit_hours: Option<f64>,
    #[serde(default)]
    pub grading_scale: GradingScale,
    #[serde(default = "default_max_points")]
    pub max_points: f64,
    #[serde(default)]
    pub gpa_scale: GpaScale,
    #[serde(default)]
    pub handle_missing: MissingPolicy,
    #[serde(default)]
    pub target_grade: Option<String>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub course_id: String,
    pub target_grade: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Where course snapshots come from. The aggregators never call this
/// themselves; handlers fetch a snapshot first and pass plain records down.
pub trait CourseSource {
    fn course(&self, course_id: &str) -> anyhow::Result<Option<Course>>;
    fn courses(&self) -> anyhow::Result<Vec<Course>>;
    fn assessments(&self, course_id: &str) -> anyhow::Result<Vec<Assessment>>;
}
