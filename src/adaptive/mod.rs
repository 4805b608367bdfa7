//! Adaptive Deriver (C9, §4.9): a pure function from the prior round's
//! result and the user's profile to the next round's generation hints.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::types::{ProfileSurvey, RoundResult};

#[derive(Debug, Clone, Serialize)]
pub struct AdaptiveParams {
    pub target_difficulty: u8,
    pub category_weights: BTreeMap<String, f64>,
    pub include_short_answer: bool,
    pub count: u32,
}

/// Round 1 has no prior result; baseline difficulty comes from self-level
/// only (§4.9: beginner→3, intermediate→5, advanced→7).
pub fn baseline(profile: &ProfileSurvey) -> AdaptiveParams {
    let category_weights = profile
        .interests
        .iter()
        .map(|c| (c.clone(), 1.0 / profile.interests.len().max(1) as f64))
        .collect();
    AdaptiveParams {
        target_difficulty: profile.self_level.baseline_difficulty(),
        category_weights,
        include_short_answer: false,
        count: 5,
    }
}

/// Round 2+: derive difficulty band, re-weight categories by the prior
/// round's wrong counts, and decide whether to force a short_answer item.
pub fn derive(
    profile: &ProfileSurvey,
    prior_difficulty: u8,
    prior: &RoundResult,
    prior_short_answer_recall: Option<f64>,
) -> AdaptiveParams {
    let offset: i16 = if prior.score < 40.0 {
        -1
    } else if prior.score <= 70.0 {
        0
    } else if prior.score <= 90.0 {
        1
    } else {
        2
    };
    let target_difficulty = ((prior_difficulty as i16) + offset).clamp(1, 10) as u8;

    let mut weights: BTreeMap<String, f64> = profile
        .interests
        .iter()
        .map(|c| (c.clone(), 1.0))
        .collect();
    for (category, count) in prior.wrong_categories.iter() {
        weights
            .entry(category.clone())
            .and_modify(|w| *w *= 1.0 + *count as f64)
            .or_insert(1.0 + *count as f64);
    }
    let total: f64 = weights.values().sum();
    if total > 0.0 {
        for w in weights.values_mut() {
            *w /= total;
        }
    }

    let include_short_answer = prior_short_answer_recall.is_some_and(|r| r < 0.5);

    AdaptiveParams {
        target_difficulty,
        category_weights: weights,
        include_short_answer,
        count: 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SelfLevel, UserId};
    use std::collections::BTreeSet;

    fn profile(level: SelfLevel) -> ProfileSurvey {
        let mut interests = BTreeSet::new();
        interests.insert("rust".to_string());
        interests.insert("databases".to_string());
        ProfileSurvey::new(UserId::new(), level, 2, "engineer", "backend", interests)
    }

    #[test]
    fn baseline_difficulty_matches_self_level() {
        assert_eq!(baseline(&profile(SelfLevel::Beginner)).target_difficulty, 3);
        assert_eq!(baseline(&profile(SelfLevel::Intermediate)).target_difficulty, 5);
        assert_eq!(baseline(&profile(SelfLevel::Advanced)).target_difficulty, 7);
    }

    #[test]
    fn derive_clamps_difficulty_to_range() {
        let mut wrong = BTreeMap::new();
        wrong.insert("rust".to_string(), 3u32);
        let result = RoundResult::new(crate::types::SessionId::new(), 1, 20.0, 1, 5, wrong);
        let params = derive(&profile(SelfLevel::Beginner), 1, &result, None);
        assert_eq!(params.target_difficulty, 1); // 1 - 1 clamped to [1..10]
    }

    #[test]
    fn derive_upweights_wrong_categories() {
        let mut wrong = BTreeMap::new();
        wrong.insert("rust".to_string(), 4u32);
        let result = RoundResult::new(crate::types::SessionId::new(), 1, 80.0, 4, 5, wrong);
        let params = derive(&profile(SelfLevel::Intermediate), 5, &result, None);
        assert!(params.category_weights["rust"] > params.category_weights["databases"]);
        let sum: f64 = params.category_weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn derive_includes_short_answer_below_50pct_recall() {
        let result = RoundResult::new(crate::types::SessionId::new(), 1, 80.0, 4, 5, BTreeMap::new());
        let params = derive(&profile(SelfLevel::Intermediate), 5, &result, Some(0.33));
        assert!(params.include_short_answer);
        let params_ok = derive(&profile(SelfLevel::Intermediate), 5, &result, Some(0.75));
        assert!(!params_ok.include_short_answer);
    }
}
