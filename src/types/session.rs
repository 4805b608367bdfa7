//! Session: the unit of a round attempt (§3.1).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{SessionId, SurveyId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Paused,
    Completed,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub survey_id: SurveyId,
    pub round_index: u32,
    pub status: SessionStatus,
    pub time_limit_ms: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// `open(user, survey, round)` per the state machine table (§4.10):
    /// creates a session with `started_at=null`.
    pub fn open(
        user_id: UserId,
        survey_id: SurveyId,
        round_index: u32,
        time_limit_ms: u64,
    ) -> Self {
        assert!(round_index >= 1, "round_index must be >= 1");
        assert!(time_limit_ms > 0, "time_limit_ms must be > 0");
        Self {
            session_id: SessionId::new(),
            user_id,
            survey_id,
            round_index,
            status: SessionStatus::InProgress,
            time_limit_ms,
            started_at: None,
            paused_at: None,
            created_at: Utc::now(),
        }
    }

    /// The instant overtime is measured against: `paused_at` if paused, else
    /// `now`. §4.8 step 3: "If the session is already paused, elapsed is
    /// measured to paused_at, not to now".
    pub fn reference_instant(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.status {
            SessionStatus::Paused => self.paused_at.unwrap_or(now),
            _ => now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_in_progress_with_no_start() {
        let s = Session::open(UserId::new(), SurveyId::new(), 1, 600_000);
        assert_eq!(s.status, SessionStatus::InProgress);
        assert!(s.started_at.is_none());
        assert!(s.paused_at.is_none());
    }

    #[test]
    #[should_panic]
    fn open_rejects_round_zero() {
        Session::open(UserId::new(), SurveyId::new(), 0, 600_000);
    }

    #[test]
    fn reference_instant_uses_paused_at_when_paused() {
        let mut s = Session::open(UserId::new(), SurveyId::new(), 1, 600_000);
        let paused_at = Utc::now();
        s.status = SessionStatus::Paused;
        s.paused_at = Some(paused_at);
        let later = paused_at + chrono::Duration::minutes(5);
        assert_eq!(s.reference_instant(later), paused_at);
    }
}
