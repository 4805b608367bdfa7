//! Core data model entities (§3).

pub mod answer;
pub mod ids;
pub mod profile;
pub mod question;
pub mod result;
pub mod session;

pub use answer::AttemptAnswer;
pub use ids::{AnswerId, QuestionId, ResultId, SessionId, SurveyId, UserId};
pub use profile::{ProfileSurvey, SelfLevel};
pub use question::{AnswerPayload, AnswerSchema, ItemType, Question};
pub use result::RoundResult;
pub use session::{Session, SessionStatus};
