#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use secrecy::SecretString;

use cbt_server::{
    app_state::AppState,
    config::{Config, CutoffPolicy, StorageBackend},
    models::{
        domain::{
            school::{ExamComponents, ResultComponent, TeacherSubjectAssignment, TermInfo},
            AcademicSession, ClassEnrolment, ExamDefinition, ResultSetting, SchoolClass, Term,
            Timetable,
        },
        dto::request::{
            BindQuestionsRequest, CreateExamDefinitionRequest, CreateTimetableRequest,
            QuestionInput, ScheduleSlotRequest,
        },
    },
    repositories::{InMemoryStore, Repositories},
    services::{FixedClock, FixedSeedSource},
};

pub const SESSION: &str = "session-2030";
pub const CLASS: &str = "jss1-a";
pub const LEVEL: &str = "jss1";
pub const CLASS_TEACHER: &str = "teacher-form";
pub const MATH_TEACHER: &str = "teacher-math";
pub const MATH: &str = "mathematics";
pub const ENGLISH: &str = "english";
pub const OBJ_WEIGHT: f64 = 60.0;
pub const STUDENTS: [&str; 4] = ["student-1", "student-2", "student-3", "student-4"];

pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 6, day, hour, minute, 0).unwrap()
}

/// 09:00 on exam day.
pub fn math_start() -> DateTime<Utc> {
    at(10, 9, 0)
}

pub fn config() -> Config {
    Config {
        mongo_conn_string: "mongodb://localhost:27017".to_string(),
        mongo_db_name: "cbt-test".to_string(),
        storage_backend: StorageBackend::Memory,
        web_server_host: "127.0.0.1".to_string(),
        web_server_port: 8080,
        jwt_secret: SecretString::from("integration_test_secret".to_string()),
        jwt_expiration_hours: 1,
        cutoffs: CutoffPolicy {
            first_cutoff_minutes: 10,
            last_cutoff_minutes: 5,
            grace_period_minutes: 5,
        },
    }
}

pub struct TestWorld {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub state: AppState,
}

/// One active first term, one class offering maths and English, four enrolled
/// students and a 60% objective weight for the class level.
pub async fn world() -> TestWorld {
    let store = Arc::new(InMemoryStore::new());

    store
        .insert_session(AcademicSession {
            id: SESSION.into(),
            name: "2030/2031".into(),
            is_active: true,
            terms: vec![
                TermInfo { name: Term::FirstTerm, is_active: true },
                TermInfo { name: Term::SecondTerm, is_active: false },
            ],
        })
        .await;
    store
        .insert_class(SchoolClass {
            id: CLASS.into(),
            name: "JSS 1A".into(),
            level: LEVEL.into(),
            class_teacher_id: Some(CLASS_TEACHER.into()),
            compulsory_subjects: vec![MATH.into(), ENGLISH.into()],
            teacher_subject_assignments: vec![TeacherSubjectAssignment {
                subject_id: MATH.into(),
                teacher_id: MATH_TEACHER.into(),
            }],
        })
        .await;
    store
        .insert_enrolment(ClassEnrolment {
            id: "enrolment-1".into(),
            class_id: CLASS.into(),
            academic_session_id: SESSION.into(),
            students: STUDENTS.iter().map(|s| s.to_string()).collect(),
            is_active: true,
        })
        .await;
    store
        .insert_result_setting(ResultSetting {
            level: LEVEL.into(),
            exam_components: ExamComponents {
                exam_name: "Terminal Exam".into(),
                components: vec![
                    ResultComponent {
                        key: "obj".into(),
                        name: "Objective".into(),
                        percentage: OBJ_WEIGHT,
                    },
                    ResultComponent {
                        key: "theory".into(),
                        name: "Theory".into(),
                        percentage: 40.0,
                    },
                ],
            },
        })
        .await;

    let clock = Arc::new(FixedClock::new(at(1, 8, 0)));
    let state = AppState::with_repositories(
        config(),
        Repositories::in_memory(store.clone()),
        None,
        clock.clone(),
        Arc::new(FixedSeedSource::new(1234)),
    );

    TestWorld { store, clock, state }
}

pub fn exam_request() -> CreateExamDefinitionRequest {
    CreateExamDefinitionRequest {
        academic_session_id: SESSION.into(),
        term: Term::FirstTerm,
        title: "First Term Examination".into(),
        min_obj_questions: 20,
        max_obj_questions: 40,
        expected_obj_number_of_options: 4,
        number_of_questions_per_student: 10,
    }
}

pub fn slot(subject: &str, start: DateTime<Utc>, minutes: i64) -> ScheduleSlotRequest {
    ScheduleSlotRequest {
        subject_id: subject.into(),
        start_time: start,
        duration: minutes * 60,
        theory_start_time: None,
        theory_duration: None,
    }
}

pub fn timetable_request(slots: Vec<ScheduleSlotRequest>) -> CreateTimetableRequest {
    CreateTimetableRequest {
        academic_session_id: SESSION.into(),
        term: Term::FirstTerm,
        timetable: slots,
    }
}

/// `count` distinct questions; option 0 ("right-N") is always correct.
pub fn pool(count: usize) -> Vec<QuestionInput> {
    (0..count)
        .map(|i| QuestionInput {
            question_number: i as i32 + 1,
            question_text: format!("Question number {}", i + 1),
            options: vec![
                format!("right-{}", i),
                format!("wrong-a-{}", i),
                format!("wrong-b-{}", i),
                format!("wrong-c-{}", i),
            ],
            correct_option: 0,
            score: 1,
        })
        .collect()
}

pub fn bind_request(questions: Vec<QuestionInput>) -> BindQuestionsRequest {
    BindQuestionsRequest {
        academic_session_id: SESSION.into(),
        term: Term::FirstTerm,
        questions,
    }
}

/// Exam definition plus a timetable with maths at 09:00 (60 min) and English
/// at 11:00 on exam day.
pub async fn scheduled(world: &TestWorld) -> (ExamDefinition, Timetable) {
    let definition = world
        .state
        .exam_definition_service
        .create(exam_request())
        .await
        .unwrap();
    let timetable = world
        .state
        .timetable_service
        .create_timetable(
            CLASS,
            timetable_request(vec![
                slot(MATH, math_start(), 60),
                slot(ENGLISH, at(10, 11, 0), 60),
            ]),
        )
        .await
        .unwrap();
    (definition, timetable)
}

/// `scheduled` plus 25 bound maths questions.
pub async fn with_math_questions(world: &TestWorld) -> (ExamDefinition, Timetable) {
    let scheduled = scheduled(world).await;
    world
        .state
        .question_bank_service
        .bind_questions(MATH_TEACHER, CLASS, MATH, bind_request(pool(25)))
        .await
        .unwrap();
    scheduled
}

/// `with_math_questions`, clock moved inside the window, and `students` authorized.
pub async fn exam_in_progress(world: &TestWorld, students: &[&str]) -> (ExamDefinition, Timetable) {
    let scheduled = with_math_questions(world).await;
    world.clock.set(math_start() + Duration::minutes(2));
    world
        .state
        .authorization_service
        .authorize_students(
            CLASS_TEACHER,
            CLASS,
            cbt_server::models::dto::request::AuthorizeStudentsRequest {
                academic_session_id: SESSION.into(),
                term: Term::FirstTerm,
                subject_id: MATH.into(),
                student_ids: students.iter().map(|s| s.to_string()).collect(),
            },
        )
        .await
        .unwrap();
    scheduled
}

pub fn start_request() -> cbt_server::models::dto::request::StartExamRequest {
    cbt_server::models::dto::request::StartExamRequest {
        academic_session_id: SESSION.into(),
        class_id: CLASS.into(),
        subject_id: MATH.into(),
        term: Term::FirstTerm,
    }
}
