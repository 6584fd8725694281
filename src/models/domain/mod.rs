pub mod exam_attempt;
pub mod exam_definition;
pub mod question_set;
pub mod recomputation_job;
pub mod result;
pub mod school;
pub mod timetable;
pub use exam_attempt::{AnswerUpdate, AttemptKey, AttemptQuestion, AttemptState, AttemptStatus, ExamAttempt, TriggerType};
pub use exam_definition::{ExamDefinition, QuestionBounds, Term};
pub use question_set::{ExamWindow, ObjectiveQuestion, QuestionSet, SubjectExamKey};
pub use recomputation_job::{RecomputationJob, RecomputationKey, RecomputationKind};
pub use result::{ScoreEntry, StudentResult, SubjectResult};
pub use school::{AcademicSession, ClassEnrolment, ResultSetting, SchoolClass};
pub use timetable::{ParticipationSet, Timetable, TimetableEntry};
