use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

use super::category::category_average;
use super::scale::{format_scale_value, percentage_to_letter, percentage_to_scale};
use super::{round_to, CalcError};
use crate::model::{Assessment, Course, GpaScale, GradingScale};

const WEIGHT_TOTAL: f64 = 100.0;
const WEIGHT_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    pub category_id: String,
    pub name: String,
    pub weight: f64,
    pub average: Option<f64>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDisplay {
    pub grading_scale: GradingScale,
    pub gpa_scale: GpaScale,
    pub value: f64,
    pub text: String,
    pub letter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGrade {
    pub success: bool,
    /// Always a percentage; `display` holds the course's own scale.
    pub course_grade: f64,
    pub category_averages: Vec<CategoryResult>,
    pub graded_weight: f64,
    pub total_weight: f64,
    pub display: CourseDisplay,
}

pub(super) fn usable_weight(w: f64) -> bool {
    w.is_finite() && w >= 0.0
}

/// Group assessments by owning category. Order inside a category is kept.
pub fn group_by_category(assessments: &[Assessment]) -> HashMap<&str, Vec<&Assessment>> {
    let mut by_category: HashMap<&str, Vec<&Assessment>> = HashMap::new();
    for a in assessments {
        by_category.entry(a.category_id.as_str()).or_default().push(a);
    }
    by_category
}

/// Weighted grade over graded categories only. A category with no gradable
/// work drops out of both sides of the ratio so the remaining weight is
/// re-normalised instead of counting the empty category as zero.
pub fn course_grade(course: &Course, assessments: &[Assessment]) -> CourseGrade {
    let by_category = group_by_category(assessments);

    let mut weighted_sum = 0.0_f64;
    let mut graded_weight = 0.0_f64;
    let mut total_weight = 0.0_f64;
    let mut category_averages = Vec::with_capacity(course.categories.len());

    for c in &course.categories {
        let items = by_category
            .get(c.id.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        let avg = category_average(items.iter().copied(), course.handle_missing);
        category_averages.push(CategoryResult {
            category_id: c.id.clone(),
            name: c.name.clone(),
            weight: c.weight,
            average: avg.average,
            count: avg.count,
        });

        if !usable_weight(c.weight) {
            tracing::debug!(category = %c.id, weight = c.weight, "skipping unusable category weight");
            continue;
        }
        total_weight += c.weight;
        let Some(average) = avg.average else {
            continue;
        };
        weighted_sum += average * c.weight;
        graded_weight += c.weight;
    }

    let unknown = assessments
        .iter()
        .filter(|a| !course.categories.iter().any(|c| c.id == a.category_id))
        .count();
    if unknown > 0 {
        tracing::debug!(course = %course.id, unknown, "assessments reference unknown categories");
    }

    let (success, percent) = if graded_weight > 0.0 {
        (true, round_to(weighted_sum / graded_weight, 2))
    } else {
        (false, 0.0)
    };

    CourseGrade {
        success,
        course_grade: percent,
        category_averages,
        graded_weight,
        total_weight,
        display: display_for(course, percent),
    }
}

fn display_for(course: &Course, percent: f64) -> CourseDisplay {
    CourseDisplay {
        grading_scale: course.grading_scale,
        gpa_scale: course.gpa_scale,
        value: percentage_to_scale(
            percent,
            course.grading_scale,
            course.max_points,
            course.gpa_scale,
        ),
        text: format_scale_value(
            percent,
            course.grading_scale,
            course.max_points,
            course.gpa_scale,
        ),
        letter: percentage_to_letter(percent).to_string(),
    }
}

/// Save-time check that category weights are each in `[0,100]` and sum to
/// 100. The aggregators themselves never call this.
pub fn validate_category_weights(course: &Course) -> Result<(), CalcError> {
    for c in &course.categories {
        if !usable_weight(c.weight) || c.weight > WEIGHT_TOTAL {
            return Err(CalcError::new(
                "bad_weights",
                format!("category '{}' weight must be between 0 and 100", c.name),
            )
            .with_details(json!({ "categoryId": c.id, "weight": c.weight })));
        }
    }
    if course.categories.is_empty() {
        return Ok(());
    }
    let total: f64 = course.categories.iter().map(|c| c.weight).sum();
    if (total - WEIGHT_TOTAL).abs() > WEIGHT_TOLERANCE {
        return Err(
            CalcError::new("bad_weights", "category weights must sum to 100")
                .with_details(json!({ "total": round_to(total, 2) })),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::scale::percentage_to_gpa;
    use crate::model::{Category, MissingPolicy};

    fn category(id: &str, weight: f64) -> Category {
        Category {
            id: id.to_string(),
            name: id.to_uppercase(),
            weight,
        }
    }

    fn course(categories: Vec<Category>) -> Course {
        Course {
            id: "bio101".to_string(),
            name: "Biology".to_string(),
            credit_hours: Some(3.0),
            grading_scale: GradingScale::Percentage,
            max_points: 100.0,
            gpa_scale: GpaScale::Four,
            handle_missing: MissingPolicy::Exclude,
            target_grade: None,
            categories,
        }
    }

    fn scored(category_id: &str, score: Option<f64>, max: f64) -> Assessment {
        Assessment {
            id: String::new(),
            category_id: category_id.to_string(),
            max_score: max,
            score,
            is_extra_credit: false,
            extra_credit_points: 0.0,
            name: String::new(),
            date: None,
            note: None,
            assessment_type: None,
        }
    }

    #[test]
    fn weighted_course_grade_end_to_end() {
        let c = course(vec![
            category("hw", 30.0),
            category("quiz", 30.0),
            category("exam", 40.0),
        ]);
        let grades = vec![
            scored("hw", Some(27.0), 30.0),
            scored("quiz", Some(24.0), 30.0),
            scored("exam", Some(38.0), 40.0),
        ];
        let g = course_grade(&c, &grades);
        assert!(g.success);
        assert_eq!(g.course_grade, 89.0);
        assert_eq!(percentage_to_gpa(g.course_grade, GpaScale::Four), 3.0);
        assert_eq!(g.category_averages.len(), 3);
        assert_eq!(g.graded_weight, 100.0);
        assert_eq!(g.display.text, "89.0%");
        assert_eq!(g.display.letter, "B+");
    }

    #[test]
    fn ungraded_category_is_renormalised_away() {
        let c = course(vec![category("a", 50.0), category("b", 50.0)]);
        let grades = vec![scored("a", Some(8.0), 10.0), scored("b", None, 10.0)];
        let g = course_grade(&c, &grades);
        assert!(g.success);
        assert_eq!(g.course_grade, 80.0);
        assert_eq!(g.graded_weight, 50.0);
        assert_eq!(g.total_weight, 100.0);
        assert_eq!(g.category_averages[1].average, None);
    }

    #[test]
    fn zero_policy_keeps_the_category_in() {
        let mut c = course(vec![category("a", 50.0), category("b", 50.0)]);
        c.handle_missing = MissingPolicy::Zero;
        let grades = vec![scored("a", Some(8.0), 10.0), scored("b", None, 10.0)];
        let g = course_grade(&c, &grades);
        assert_eq!(g.course_grade, 40.0);
    }

    #[test]
    fn no_graded_work_is_unsuccessful_not_zero_earned() {
        let c = course(vec![category("a", 60.0), category("b", 40.0)]);
        let g = course_grade(&c, &[]);
        assert!(!g.success);
        assert_eq!(g.course_grade, 0.0);

        let g = course_grade(&course(Vec::new()), &[]);
        assert!(!g.success);
    }

    #[test]
    fn display_follows_course_scale() {
        let mut c = course(vec![category("a", 100.0)]);
        c.grading_scale = GradingScale::Points;
        c.max_points = 50.0;
        let g = course_grade(&c, &[scored("a", Some(9.0), 10.0)]);
        assert_eq!(g.course_grade, 90.0);
        assert_eq!(g.display.value, 45.0);

        c.grading_scale = GradingScale::Gpa;
        c.gpa_scale = GpaScale::InvertedFour;
        let g = course_grade(&c, &[scored("a", Some(9.0), 10.0)]);
        assert!((g.display.value - 0.7).abs() < 1e-9);
    }

    #[test]
    fn assessments_for_unknown_categories_are_ignored() {
        let c = course(vec![category("a", 100.0)]);
        let grades = vec![scored("a", Some(7.0), 10.0), scored("zzz", Some(0.0), 10.0)];
        assert_eq!(course_grade(&c, &grades).course_grade, 70.0);
    }

    #[test]
    fn course_grade_is_repeatable() {
        let c = course(vec![category("a", 25.0), category("b", 75.0)]);
        let grades = vec![scored("a", Some(3.0), 7.0), scored("b", Some(11.0), 13.0)];
        assert_eq!(course_grade(&c, &grades), course_grade(&c, &grades));
    }

    #[test]
    fn parallel_callers_share_one_snapshot() {
        let c = std::sync::Arc::new(course(vec![category("a", 40.0), category("b", 60.0)]));
        let grades = std::sync::Arc::new(vec![
            scored("a", Some(17.0), 20.0),
            scored("b", Some(41.0), 50.0),
        ]);
        let expected = course_grade(&c, &grades);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = std::sync::Arc::clone(&c);
                let grades = std::sync::Arc::clone(&grades);
                std::thread::spawn(move || course_grade(&c, &grades))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().expect("join"), expected);
        }
    }

    #[test]
    fn weight_validation() {
        let ok = course(vec![category("a", 33.33), category("b", 66.67)]);
        assert!(validate_category_weights(&ok).is_ok());
        assert!(validate_category_weights(&course(Vec::new())).is_ok());

        let short = course(vec![category("a", 40.0), category("b", 40.0)]);
        let e = validate_category_weights(&short).unwrap_err();
        assert_eq!(e.code, "bad_weights");

        let negative = course(vec![category("a", -10.0), category("b", 110.0)]);
        assert!(validate_category_weights(&negative).is_err());
    }
}
