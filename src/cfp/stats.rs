use serde::Serialize;

use crate::db::Review;

/// Per-submission aggregates, computed on read. An average is `None` when
/// no review scored that criterion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubmissionStats {
    pub review_count: usize,
    pub avg_overall: Option<f64>,
    pub avg_relevance: Option<f64>,
    pub avg_technical_depth: Option<f64>,
    pub avg_clarity: Option<f64>,
    pub avg_diversity: Option<f64>,
}

impl SubmissionStats {
    /// Count only. Used for reviewers so other scores cannot anchor theirs.
    pub fn count_only(&self) -> Self {
        Self {
            review_count: self.review_count,
            ..Default::default()
        }
    }
}

fn mean(values: impl Iterator<Item = Option<i32>>) -> Option<f64> {
    let (sum, n) = values
        .flatten()
        .fold((0i64, 0u32), |(sum, n), v| (sum + i64::from(v), n + 1));
    (n > 0).then(|| sum as f64 / f64::from(n))
}

pub fn compute_stats(reviews: &[Review]) -> SubmissionStats {
    SubmissionStats {
        review_count: reviews.len(),
        avg_overall: mean(reviews.iter().map(|r| Some(r.score_overall))),
        avg_relevance: mean(reviews.iter().map(|r| r.score_relevance)),
        avg_technical_depth: mean(reviews.iter().map(|r| r.score_technical_depth)),
        avg_clarity: mean(reviews.iter().map(|r| r.score_clarity)),
        avg_diversity: mean(reviews.iter().map(|r| r.score_diversity)),
    }
}
