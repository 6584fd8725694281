pub mod authorization_service;
pub mod clock;
pub mod exam_attempt_service;
pub mod exam_definition_service;
pub mod question_bank_service;
pub mod recomputation_dispatcher;
pub mod sampling;
pub mod scoring_service;
pub mod timetable_service;

pub use authorization_service::AuthorizationService;
pub use clock::{Clock, FixedClock, SystemClock};
pub use exam_attempt_service::ExamAttemptService;
pub use exam_definition_service::ExamDefinitionService;
pub use question_bank_service::QuestionBankService;
pub use recomputation_dispatcher::RecomputationDispatcher;
pub use sampling::{FixedSeedSource, RandomSeedSource, SeedSource};
pub use scoring_service::ScoringService;
pub use timetable_service::TimetableService;
