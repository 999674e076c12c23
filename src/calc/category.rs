use serde::Serialize;

use crate::model::{Assessment, MissingPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAverage {
    /// `None` means the category has nothing gradable yet, which is not
    /// the same as averaging zero.
    pub average: Option<f64>,
    pub count: usize,
}

/// Percentage one assessment contributes to its category, or `None` when
/// it is left out (missing under `Exclude`, or malformed).
fn contribution(a: &Assessment, policy: MissingPolicy) -> Option<f64> {
    if !a.max_score.is_finite() || a.max_score <= 0.0 {
        return None;
    }
    let Some(score) = a.score else {
        return match policy {
            MissingPolicy::Exclude => None,
            MissingPolicy::Zero => Some(0.0),
        };
    };
    if !score.is_finite() {
        return None;
    }

    let mut percent = 100.0 * score.clamp(0.0, a.max_score) / a.max_score;
    // Extra credit sits on top of the earned percentage and may exceed 100.
    if a.is_extra_credit && a.extra_credit_points.is_finite() && a.extra_credit_points > 0.0 {
        percent += a.extra_credit_points;
    }
    Some(percent)
}

/// Simple mean of per-assessment percentages: every assessment counts the
/// same regardless of its point value.
pub fn category_average<'a, I>(assessments: I, policy: MissingPolicy) -> CategoryAverage
where
    I: IntoIterator<Item = &'a Assessment>,
{
    let mut sum = 0.0_f64;
    let mut count: usize = 0;

    for a in assessments {
        let Some(percent) = contribution(a, policy) else {
            continue;
        };
        sum += percent;
        count += 1;
    }

    let average = if count > 0 {
        Some(sum / (count as f64))
    } else {
        None
    };
    CategoryAverage { average, count }
}
