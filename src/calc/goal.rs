//! Rule-based goal feasibility. No model calls happen here; the AI study
//! recommendations are fetched and rendered elsewhere.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::course::{course_grade, usable_weight};
use super::scale::{gpa_to_percentage, letter_to_percentage};
use super::{round_to, CalcError};
use crate::model::{Assessment, Course, GpaScale};

/// Bare numbers at or below this are read as GPA values.
const GPA_CEILING: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityThresholds {
    pub achievable: f64,
    pub moderate: f64,
}

impl Default for FeasibilityThresholds {
    fn default() -> Self {
        Self {
            achievable: 5.0,
            moderate: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Feasibility {
    Exceeded,
    Achievable,
    Moderate,
    Challenging,
}

impl Feasibility {
    pub fn classify(difference: f64, thresholds: &FeasibilityThresholds) -> Self {
        if difference <= 0.0 {
            Feasibility::Exceeded
        } else if difference <= thresholds.achievable {
            Feasibility::Achievable
        } else if difference <= thresholds.moderate {
            Feasibility::Moderate
        } else {
            Feasibility::Challenging
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Percentage,
    Gpa,
    Letter,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTarget {
    pub percentage: f64,
    pub kind: TargetKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalAnalysis {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub feasibility: Option<Feasibility>,
    pub current_grade: f64,
    pub target_grade: f64,
    pub target_kind: Option<TargetKind>,
    pub difference: f64,
    pub required_average: Option<f64>,
    pub recommendations: Vec<String>,
}

impl GoalAnalysis {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            feasibility: None,
            current_grade: 0.0,
            target_grade: 0.0,
            target_kind: None,
            difference: 0.0,
            required_average: None,
            recommendations: Vec::new(),
        }
    }
}

/// Digits with at most one decimal point, nothing else.
fn plain_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let mut dots = 0;
    for (i, ch) in s.chars().enumerate() {
        match ch {
            '0'..='9' => {}
            '.' if i > 0 => dots += 1,
            _ => return None,
        }
    }
    if s.is_empty() || dots > 1 || s.ends_with('.') {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Read a target such as `"90%"`, `"85"`, `"3.5"` or `"B+"`.
///
/// GPA and letter targets go through the lossy bucket-floor inverse, so a
/// 3.3 target becomes 90%, the least that still earns a 3.3.
pub fn parse_target(text: &str, gpa_scale: GpaScale) -> Result<ParsedTarget, CalcError> {
    let t = text.trim();
    if t.is_empty() {
        return Err(CalcError::new("bad_target", "target grade is empty"));
    }

    if let Some(num) = t.strip_suffix('%') {
        return match plain_number(num) {
            Some(p) => Ok(ParsedTarget {
                percentage: p,
                kind: TargetKind::Percentage,
            }),
            None => Err(CalcError::new(
                "bad_target",
                format!("could not read '{t}' as a percentage"),
            )),
        };
    }

    if let Some(n) = plain_number(t) {
        if n > GPA_CEILING {
            return Ok(ParsedTarget {
                percentage: n,
                kind: TargetKind::Percentage,
            });
        }
        return Ok(ParsedTarget {
            percentage: gpa_to_percentage(n, gpa_scale),
            kind: TargetKind::Gpa,
        });
    }

    if let Some(p) = letter_to_percentage(t) {
        return Ok(ParsedTarget {
            percentage: p,
            kind: TargetKind::Letter,
        });
    }

    Err(CalcError::new(
        "bad_target",
        format!("could not read '{t}' as a percentage, GPA or letter grade"),
    )
    .with_details(json!({ "target": t })))
}

fn display_name(name: &str, id: &str) -> String {
    if name.trim().is_empty() {
        id.to_string()
    } else {
        name.to_string()
    }
}

pub fn analyze_goal_feasibility(
    course: &Course,
    target_text: &str,
    assessments: &[Assessment],
    thresholds: &FeasibilityThresholds,
) -> GoalAnalysis {
    let target = match parse_target(target_text, course.gpa_scale) {
        Ok(t) => t,
        Err(e) => return GoalAnalysis::failed(e.message),
    };

    let grade = course_grade(course, assessments);
    if course.categories.is_empty() || grade.total_weight <= 0.0 {
        return GoalAnalysis::failed("insufficient data");
    }

    let current = grade.course_grade;
    let difference = round_to(target.percentage - current, 2);
    let feasibility = Feasibility::classify(difference, thresholds);

    // Earned weighted points before the course grade was rounded.
    let earned: f64 = grade
        .category_averages
        .iter()
        .filter(|c| usable_weight(c.weight))
        .filter_map(|c| c.average.map(|avg| avg * c.weight))
        .sum();
    let remaining_weight = round_to(grade.total_weight - grade.graded_weight, 2);
    let required_average = if remaining_weight > 0.0 {
        Some(round_to(
            (target.percentage * grade.total_weight - earned) / remaining_weight,
            2,
        ))
    } else {
        None
    };

    let mut recommendations = Vec::new();
    recommendations.push(match feasibility {
        Feasibility::Exceeded => format!(
            "You are at {current:.1}%, already at or above your {:.1}% target. Keep your current pace.",
            target.percentage
        ),
        Feasibility::Achievable => format!(
            "You are {difference:.1} points from your {:.1}% target; steady work on the remaining assessments should get you there.",
            target.percentage
        ),
        Feasibility::Moderate => format!(
            "Reaching {:.1}% needs a {difference:.1}-point improvement; prioritise the most heavily weighted categories.",
            target.percentage
        ),
        Feasibility::Challenging => format!(
            "Your {:.1}% target is {difference:.1} points above your current grade; consider asking your instructor about improvement options.",
            target.percentage
        ),
    });

    for c in &grade.category_averages {
        let name = display_name(&c.name, &c.category_id);
        match c.average {
            None => recommendations.push(format!(
                "No grades recorded yet in {name} ({:.1}% of the course).",
                round_to(c.weight, 2)
            )),
            Some(avg) if avg < target.percentage => recommendations.push(format!(
                "Focus on {name}: averaging {avg:.1}% against a {:.1}% target.",
                target.percentage
            )),
            Some(_) => {}
        }
    }

    if feasibility != Feasibility::Exceeded {
        if let Some(required) = required_average {
            if required > 100.0 {
                recommendations.push(format!(
                    "The target needs {required:.1}% on the remaining {remaining_weight:.1}% of the course, which is above 100%."
                ));
            } else {
                recommendations.push(format!(
                    "Averaging {required:.1}% on the remaining {remaining_weight:.1}% of the course reaches the target."
                ));
            }
        }
    }

    GoalAnalysis {
        success: true,
        message: None,
        feasibility: Some(feasibility),
        current_grade: current,
        target_grade: target.percentage,
        target_kind: Some(target.kind),
        difference,
        required_average,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, GradingScale, MissingPolicy};

    fn course() -> Course {
        Course {
            id: "chem".to_string(),
            name: "Chemistry".to_string(),
            credit_hours: None,
            grading_scale: GradingScale::Percentage,
            max_points: 100.0,
            gpa_scale: GpaScale::Four,
            handle_missing: MissingPolicy::Exclude,
            target_grade: None,
            categories: vec![
                Category {
                    id: "labs".to_string(),
                    name: "Labs".to_string(),
                    weight: 40.0,
                },
                Category {
                    id: "final".to_string(),
                    name: "Final".to_string(),
                    weight: 60.0,
                },
            ],
        }
    }

    fn lab(score: f64) -> Assessment {
        Assessment {
            id: String::new(),
            category_id: "labs".to_string(),
            max_score: 100.0,
            score: Some(score),
            is_extra_credit: false,
            extra_credit_points: 0.0,
            name: String::new(),
            date: None,
            note: None,
            assessment_type: None,
        }
    }

    #[test]
    fn target_text_forms() {
        let p = parse_target("90%", GpaScale::Four).expect("percent");
        assert_eq!((p.percentage, p.kind), (90.0, TargetKind::Percentage));
        let p = parse_target(" 87.5 ", GpaScale::Four).expect("bare");
        assert_eq!((p.percentage, p.kind), (87.5, TargetKind::Percentage));
        let p = parse_target("3.3", GpaScale::Four).expect("gpa");
        assert_eq!((p.percentage, p.kind), (90.0, TargetKind::Gpa));
        let p = parse_target("5", GpaScale::Five).expect("gpa five");
        assert_eq!(p.percentage, 97.0);
        let p = parse_target("A-", GpaScale::Four).expect("letter");
        assert_eq!((p.percentage, p.kind), (90.0, TargetKind::Letter));
    }

    #[test]
    fn unreadable_targets_are_rejected() {
        for bad in ["", "ninety", "-5%", "1e2", "9..1", "%", "3."] {
            let e = parse_target(bad, GpaScale::Four).unwrap_err();
            assert_eq!(e.code, "bad_target", "input {bad:?}");
        }
    }

    #[test]
    fn classification_thresholds() {
        let t = FeasibilityThresholds::default();
        assert_eq!(Feasibility::classify(-1.0, &t), Feasibility::Exceeded);
        assert_eq!(Feasibility::classify(0.0, &t), Feasibility::Exceeded);
        assert_eq!(Feasibility::classify(5.0, &t), Feasibility::Achievable);
        assert_eq!(Feasibility::classify(5.01, &t), Feasibility::Moderate);
        assert_eq!(Feasibility::classify(15.0, &t), Feasibility::Moderate);
        assert_eq!(Feasibility::classify(15.5, &t), Feasibility::Challenging);
    }

    #[test]
    fn moderate_goal_with_ungraded_final() {
        let a = analyze_goal_feasibility(
            &course(),
            "90%",
            &[lab(80.0)],
            &FeasibilityThresholds::default(),
        );
        assert!(a.success);
        assert_eq!(a.current_grade, 80.0);
        assert_eq!(a.difference, 10.0);
        assert_eq!(a.feasibility, Some(Feasibility::Moderate));
        // (90*100 - 80*40) / 60
        assert_eq!(a.required_average, Some(96.67));
        assert!(a.recommendations.iter().any(|r| r.contains("No grades recorded yet in Final")));
        assert!(a.recommendations.iter().any(|r| r.contains("Focus on Labs")));
    }

    #[test]
    fn exceeded_goal() {
        let a = analyze_goal_feasibility(
            &course(),
            "B",
            &[lab(95.0)],
            &FeasibilityThresholds::default(),
        );
        assert_eq!(a.feasibility, Some(Feasibility::Exceeded));
        assert_eq!(a.target_grade, 83.0);
        assert!(a.difference < 0.0);
    }

    #[test]
    fn insufficient_data_and_parse_failures() {
        let mut empty = course();
        empty.categories.clear();
        let a = analyze_goal_feasibility(&empty, "90%", &[], &FeasibilityThresholds::default());
        assert!(!a.success);
        assert_eq!(a.message.as_deref(), Some("insufficient data"));

        let mut weightless = course();
        for c in &mut weightless.categories {
            c.weight = 0.0;
        }
        let a = analyze_goal_feasibility(&weightless, "90%", &[], &FeasibilityThresholds::default());
        assert_eq!(a.message.as_deref(), Some("insufficient data"));

        let a = analyze_goal_feasibility(&course(), "soon", &[], &FeasibilityThresholds::default());
        assert!(!a.success);
        assert!(a.message.unwrap_or_default().contains("could not read"));
    }

    #[test]
    fn custom_thresholds_shift_classes() {
        let t = FeasibilityThresholds {
            achievable: 12.0,
            moderate: 20.0,
        };
        let a = analyze_goal_feasibility(&course(), "90", &[lab(80.0)], &t);
        assert_eq!(a.feasibility, Some(Feasibility::Achievable));
    }

    #[test]
    fn analysis_is_repeatable() {
        let grades = [lab(71.0), lab(64.5)];
        let t = FeasibilityThresholds::default();
        let first = analyze_goal_feasibility(&course(), "B+", &grades, &t);
        let second = analyze_goal_feasibility(&course(), "B+", &grades, &t);
        assert_eq!(first, second);
        assert_eq!(first.recommendations, second.recommendations);
        assert!(!first.recommendations.is_empty());
    }

    #[test]
    fn weights_in_recommendations_are_rounded() {
        let mut c = course();
        c.categories[0].weight = 70.1;
        c.categories[1].weight = 29.9;
        let a = analyze_goal_feasibility(&c, "95%", &[lab(80.0)], &FeasibilityThresholds::default());
        assert!(a.success);
        assert!(a
            .recommendations
            .iter()
            .any(|r| r.contains("remaining 29.9% of the course")));
        assert!(a
            .recommendations
            .iter()
            .any(|r| r.contains("No grades recorded yet in Final (29.9% of the course)")));
        assert!(a.recommendations.iter().all(|r| !r.contains("0000")));
    }

    #[test]
    fn required_average_uses_unrounded_progress() {
        // Labs average 66.666..., shown as 66.67.
        let a = analyze_goal_feasibility(
            &course(),
            "90%",
            &[lab(200.0 / 3.0)],
            &FeasibilityThresholds::default(),
        );
        assert_eq!(a.current_grade, 66.67);
        // (90*100 - 66.666...*40) / 60 = 105.555...
        assert_eq!(a.required_average, Some(105.56));
    }
}
