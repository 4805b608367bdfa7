//! RoundResult: the aggregated outcome of a scored round (§3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::{ResultId, SessionId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResult {
    pub result_id: ResultId,
    pub session_id: SessionId,
    pub round_index: u32,
    pub score: f64,
    pub correct_count: u32,
    pub total_count: u32,
    pub wrong_categories: BTreeMap<String, u32>,
    pub created_at: DateTime<Utc>,
}

impl RoundResult {
    pub fn new(
        session_id: SessionId,
        round_index: u32,
        score: f64,
        correct_count: u32,
        total_count: u32,
        wrong_categories: BTreeMap<String, u32>,
    ) -> Self {
        Self {
            result_id: ResultId::new(),
            session_id,
            round_index,
            score,
            correct_count,
            total_count,
            wrong_categories,
            created_at: Utc::now(),
        }
    }
}
