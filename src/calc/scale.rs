//! Conversions between percentages, points, GPA scales and letters.
//!
//! Every function here is total: non-finite input degrades to 0 (or is
//! passed through) because results feed straight into display.

use super::round_to;
use crate::model::{GpaScale, GradingScale};

struct Bucket {
    floor: f64,
    gpa: f64,
    letter: &'static str,
}

// Descending by floor. Anything below the last floor is 0.0 / F.
static BUCKETS: [Bucket; 11] = [
    Bucket { floor: 97.0, gpa: 4.0, letter: "A+" },
    Bucket { floor: 93.0, gpa: 3.7, letter: "A" },
    Bucket { floor: 90.0, gpa: 3.3, letter: "A-" },
    Bucket { floor: 87.0, gpa: 3.0, letter: "B+" },
    Bucket { floor: 83.0, gpa: 2.7, letter: "B" },
    Bucket { floor: 80.0, gpa: 2.3, letter: "B-" },
    Bucket { floor: 77.0, gpa: 2.0, letter: "C+" },
    Bucket { floor: 73.0, gpa: 1.7, letter: "C" },
    Bucket { floor: 70.0, gpa: 1.3, letter: "C-" },
    Bucket { floor: 67.0, gpa: 1.0, letter: "D+" },
    Bucket { floor: 65.0, gpa: 0.7, letter: "D" },
];

const FIVE_POINT_FACTOR: f64 = 1.25;

fn bucket_for(percentage: f64) -> Option<&'static Bucket> {
    BUCKETS.iter().find(|b| percentage >= b.floor)
}

fn standard_gpa(percentage: f64) -> f64 {
    bucket_for(percentage).map(|b| b.gpa).unwrap_or(0.0)
}

pub fn percentage_to_gpa(percentage: f64, scale: GpaScale) -> f64 {
    if !percentage.is_finite() {
        return 0.0;
    }
    let standard = standard_gpa(percentage);
    match scale {
        GpaScale::Four => standard,
        GpaScale::Five => standard * FIVE_POINT_FACTOR,
        GpaScale::InvertedFour => scale.max() - standard,
        GpaScale::InvertedFive => scale.max() - standard * FIVE_POINT_FACTOR,
    }
}

pub fn percentage_to_points(percentage: f64, max_points: f64) -> f64 {
    if !percentage.is_finite() || !max_points.is_finite() || max_points <= 0.0 {
        return 0.0;
    }
    round_to(percentage / 100.0 * max_points, 2)
}

pub fn percentage_to_letter(percentage: f64) -> &'static str {
    if !percentage.is_finite() {
        return "F";
    }
    bucket_for(percentage).map(|b| b.letter).unwrap_or("F")
}

pub fn percentage_to_scale(
    percentage: f64,
    grading_scale: GradingScale,
    max_points: f64,
    gpa_scale: GpaScale,
) -> f64 {
    match grading_scale {
        GradingScale::Percentage => round_to(percentage, 1),
        GradingScale::Points => percentage_to_points(percentage, max_points),
        GradingScale::Gpa => percentage_to_gpa(percentage, gpa_scale),
    }
}

pub fn format_scale_value(
    percentage: f64,
    grading_scale: GradingScale,
    max_points: f64,
    gpa_scale: GpaScale,
) -> String {
    let v = percentage_to_scale(percentage, grading_scale, max_points, gpa_scale);
    match grading_scale {
        GradingScale::Percentage => format!("{:.1}%", v),
        GradingScale::Points => format!("{:.2} / {}", v, max_points),
        GradingScale::Gpa => format!("{:.2}", v),
    }
}

/// Approximate inverse of [`percentage_to_gpa`].
///
/// Many percentages share one GPA value, so this is lossy: it answers with
/// the lowest percentage that earns at least `gpa`, i.e. the floor of the
/// matching bucket. A GPA between two table values rounds up to the next
/// bucket.
pub fn gpa_to_percentage(gpa: f64, scale: GpaScale) -> f64 {
    if !gpa.is_finite() {
        return 0.0;
    }
    let standard = match scale {
        GpaScale::Four => gpa,
        GpaScale::Five => gpa / FIVE_POINT_FACTOR,
        GpaScale::InvertedFour => scale.max() - gpa,
        GpaScale::InvertedFive => (scale.max() - gpa) / FIVE_POINT_FACTOR,
    };
    if standard <= 0.0 {
        return 0.0;
    }
    BUCKETS
        .iter()
        .rev()
        .find(|b| b.gpa + 1e-9 >= standard)
        .map(|b| b.floor)
        .unwrap_or(BUCKETS[0].floor)
}

/// Bucket floor for a letter grade such as `B+`. `F` maps to 0.
pub fn letter_to_percentage(letter: &str) -> Option<f64> {
    let t = letter.trim().to_ascii_uppercase();
    if t == "F" {
        return Some(0.0);
    }
    BUCKETS.iter().find(|b| b.letter == t).map(|b| b.floor)
}
