use serde::Serialize;
use std::collections::HashMap;

use super::course::course_grade;
use super::round_to;
use super::scale::percentage_to_gpa;
use crate::model::{Assessment, Course, GpaScale};

pub const DEFAULT_CREDIT_HOURS: f64 = 3.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGpa {
    pub course_id: String,
    pub name: String,
    pub course_grade: f64,
    pub gpa: f64,
    pub credit_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeGpa {
    pub success: bool,
    #[serde(rename = "overallGPA")]
    pub overall_gpa: f64,
    pub total_credit_hours: f64,
    pub courses: Vec<CourseGpa>,
}

/// Credit hours a course counts for, or `None` when the value is unusable.
fn credit_hours_for(course: &Course, default_credit_hours: f64) -> Option<f64> {
    let ch = course.credit_hours.unwrap_or(default_credit_hours);
    if ch.is_finite() && ch > 0.0 {
        Some(ch)
    } else {
        None
    }
}

/// Credit-hour weighted GPA on the standard 4.0 scale. Courses without any
/// graded work are left out entirely rather than counted as 0.0.
pub fn update_cgpa(
    courses: &[Course],
    assessments_by_course: &HashMap<String, Vec<Assessment>>,
    default_credit_hours: f64,
) -> CumulativeGpa {
    let mut weighted_sum = 0.0_f64;
    let mut total_credit_hours = 0.0_f64;
    let mut breakdown = Vec::new();

    for course in courses {
        let Some(credit_hours) = credit_hours_for(course, default_credit_hours) else {
            tracing::debug!(course = %course.id, "skipping course with unusable credit hours");
            continue;
        };
        let assessments = assessments_by_course
            .get(&course.id)
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        let grade = course_grade(course, assessments);
        if !grade.success {
            continue;
        }

        let gpa = percentage_to_gpa(grade.course_grade, GpaScale::Four);
        weighted_sum += gpa * credit_hours;
        total_credit_hours += credit_hours;
        breakdown.push(CourseGpa {
            course_id: course.id.clone(),
            name: course.name.clone(),
            course_grade: grade.course_grade,
            gpa,
            credit_hours,
        });
    }

    if total_credit_hours <= 0.0 {
        return CumulativeGpa {
            success: false,
            overall_gpa: 0.0,
            total_credit_hours: 0.0,
            courses: breakdown,
        };
    }

    CumulativeGpa {
        success: true,
        overall_gpa: round_to(weighted_sum / total_credit_hours, 2),
        total_credit_hours,
        courses: breakdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, GradingScale, MissingPolicy};

    fn single_category_course(id: &str, credit_hours: Option<f64>) -> Course {
        Course {
            id: id.to_string(),
            name: id.to_string(),
            credit_hours,
            grading_scale: GradingScale::Percentage,
            max_points: 100.0,
            gpa_scale: GpaScale::Five,
            handle_missing: MissingPolicy::Exclude,
            target_grade: None,
            categories: vec![Category {
                id: format!("{id}-all"),
                name: "All".to_string(),
                weight: 100.0,
            }],
        }
    }

    fn one_score(course: &Course, score: Option<f64>) -> Vec<Assessment> {
        vec![Assessment {
            id: String::new(),
            category_id: course.categories[0].id.clone(),
            max_score: 100.0,
            score,
            is_extra_credit: false,
            extra_credit_points: 0.0,
            name: String::new(),
            date: None,
            note: None,
            assessment_type: None,
        }]
    }

    #[test]
    fn credit_hours_weight_the_average() {
        let a = single_category_course("a", Some(3.0));
        let b = single_category_course("b", Some(1.0));
        let mut grades = HashMap::new();
        grades.insert("a".to_string(), one_score(&a, Some(98.0)));
        grades.insert("b".to_string(), one_score(&b, Some(78.0)));

        let cgpa = update_cgpa(&[a, b], &grades, DEFAULT_CREDIT_HOURS);
        assert!(cgpa.success);
        assert_eq!(cgpa.overall_gpa, 3.5);
        assert_eq!(cgpa.total_credit_hours, 4.0);
        // Local 5.0 scale does not leak into the cumulative figure.
        assert_eq!(cgpa.courses[0].gpa, 4.0);
    }

    #[test]
    fn missing_credit_hours_fall_back_to_default() {
        let a = single_category_course("a", None);
        let b = single_category_course("b", Some(1.0));
        let mut grades = HashMap::new();
        grades.insert("a".to_string(), one_score(&a, Some(98.0)));
        grades.insert("b".to_string(), one_score(&b, Some(78.0)));

        let cgpa = update_cgpa(&[a, b], &grades, DEFAULT_CREDIT_HOURS);
        assert_eq!(cgpa.courses[0].credit_hours, 3.0);
        assert_eq!(cgpa.overall_gpa, 3.5);
    }

    #[test]
    fn ungraded_courses_are_left_out() {
        let a = single_category_course("a", Some(3.0));
        let b = single_category_course("b", Some(4.0));
        let mut grades = HashMap::new();
        grades.insert("a".to_string(), one_score(&a, Some(91.0)));
        grades.insert("b".to_string(), one_score(&b, None));

        let cgpa = update_cgpa(&[a, b], &grades, DEFAULT_CREDIT_HOURS);
        assert!(cgpa.success);
        assert_eq!(cgpa.overall_gpa, 3.3);
        assert_eq!(cgpa.courses.len(), 1);
    }

    #[test]
    fn nothing_graded_is_not_a_zero_gpa() {
        let a = single_category_course("a", Some(3.0));
        let cgpa = update_cgpa(&[a], &HashMap::new(), DEFAULT_CREDIT_HOURS);
        assert!(!cgpa.success);
        assert_eq!(cgpa.overall_gpa, 0.0);

        let failing = single_category_course("f", Some(3.0));
        let mut grades = HashMap::new();
        grades.insert("f".to_string(), one_score(&failing, Some(10.0)));
        let cgpa = update_cgpa(&[failing], &grades, DEFAULT_CREDIT_HOURS);
        assert!(cgpa.success);
        assert_eq!(cgpa.overall_gpa, 0.0);
    }

    #[test]
    fn non_positive_credit_hours_skip_the_course() {
        let a = single_category_course("a", Some(0.0));
        let mut grades = HashMap::new();
        grades.insert("a".to_string(), one_score(&a, Some(98.0)));
        let cgpa = update_cgpa(&[a], &grades, DEFAULT_CREDIT_HOURS);
        assert!(!cgpa.success);
    }

    #[test]
    fn cgpa_is_repeatable() {
        let a = single_category_course("a", Some(4.0));
        let b = single_category_course("b", None);
        let c = single_category_course("c", Some(2.5));
        let mut grades = HashMap::new();
        grades.insert("a".to_string(), one_score(&a, Some(91.3)));
        grades.insert("b".to_string(), one_score(&b, Some(68.0)));
        grades.insert("c".to_string(), one_score(&c, None));
        let courses = [a, b, c];

        let first = update_cgpa(&courses, &grades, DEFAULT_CREDIT_HOURS);
        let second = update_cgpa(&courses, &grades, DEFAULT_CREDIT_HOURS);
        assert_eq!(first, second);
        assert_eq!(first.courses.len(), 2);
    }
}
