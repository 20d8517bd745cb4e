use serde::Serialize;

use crate::geo::proximity::NearbyDriver;

const DISTANCE_WEIGHT: f64 = 0.70;
const RATING_WEIGHT: f64 = 0.30;

#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub distance_score: f64,
    pub rating_score: f64,
}

pub fn compute_score(candidate: &NearbyDriver) -> (f64, ScoreBreakdown) {
    let breakdown = ScoreBreakdown {
        distance_score: distance_score(candidate.distance_km),
        rating_score: rating_score(candidate.driver.stats.rating, candidate.driver.stats.rating_count),
    };

    let score = weighted_score(&breakdown);
    (score, breakdown)
}

pub fn weighted_score(breakdown: &ScoreBreakdown) -> f64 {
    (breakdown.distance_score * DISTANCE_WEIGHT) + (breakdown.rating_score * RATING_WEIGHT)
}

/// Candidates best-first.
pub fn rank(candidates: Vec<NearbyDriver>) -> Vec<(NearbyDriver, f64)> {
    let mut scored: Vec<(NearbyDriver, f64)> = candidates
        .into_iter()
        .map(|candidate| {
            let (score, _) = compute_score(&candidate);
            (candidate, score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
}

fn distance_score(distance_km: f64) -> f64 {
    1.0 / (1.0 + distance_km.max(0.0))
}

// Unrated drivers sit mid-scale rather than at the bottom.
fn rating_score(rating: f64, rating_count: u32) -> f64 {
    if rating_count == 0 {
        return 0.6;
    }
    (rating / 5.0).clamp(0.0, 1.0)
}
