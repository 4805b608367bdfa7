//! ProfileSurvey: the immutable self-evaluation a user submits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ids::{SurveyId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SelfLevel {
    /// Baseline round-1 difficulty per §4.9 ("Baseline at round 1 is derived
    /// from self_level: beginner->3, intermediate->5, advanced->7").
    pub fn baseline_difficulty(&self) -> u8 {
        match self {
            SelfLevel::Beginner => 3,
            SelfLevel::Intermediate => 5,
            SelfLevel::Advanced => 7,
        }
    }
}

/// Immutable once submitted. A re-take may create a new survey; prior
/// surveys remain — this type carries no "superseded" flag, the store's
/// "latest by user_id, submitted_at" query handles that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSurvey {
    pub survey_id: SurveyId,
    pub user_id: UserId,
    pub self_level: SelfLevel,
    pub years: u32,
    pub job_role: String,
    pub duty: String,
    pub interests: BTreeSet<String>,
    pub submitted_at: DateTime<Utc>,
}

impl ProfileSurvey {
    pub fn new(
        user_id: UserId,
        self_level: SelfLevel,
        years: u32,
        job_role: impl Into<String>,
        duty: impl Into<String>,
        interests: BTreeSet<String>,
    ) -> Self {
        Self {
            survey_id: SurveyId::new(),
            user_id,
            self_level,
            years,
            job_role: job_role.into(),
            duty: duty.into(),
            interests,
            submitted_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_difficulty_bands() {
        assert_eq!(SelfLevel::Beginner.baseline_difficulty(), 3);
        assert_eq!(SelfLevel::Intermediate.baseline_difficulty(), 5);
        assert_eq!(SelfLevel::Advanced.baseline_difficulty(), 7);
    }
}
