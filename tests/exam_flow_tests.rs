mod common;

use chrono::Duration;

use cbt_server::{
    errors::AppError,
    models::{
        domain::{AttemptStatus, ExamAttempt, Term, TriggerType},
        dto::request::{
            AnswerInput, AuthorizeStudentsRequest, ForceEndRequest, SubmitExamRequest,
            UpdateAnswersRequest, UpdateTimeRequest,
        },
    },
    repositories::{ExamAttemptRepository, QuestionSetRepository, ResultRepository, TimetableRepository},
};

use common::*;

async fn stored_attempt(world: &TestWorld, attempt_id: &str) -> ExamAttempt {
    ExamAttemptRepository::find_by_id(world.store.as_ref(), attempt_id)
        .await
        .unwrap()
        .expect("attempt is stored")
}

fn correct_answers(attempt: &ExamAttempt) -> Vec<AnswerInput> {
    attempt
        .shuffled_obj_questions
        .iter()
        .map(|q| AnswerInput {
            question_id: q.question_id.clone(),
            selected_answer: Some(q.correct_answer.clone()),
        })
        .collect()
}

fn submit_request(attempt_id: &str, trigger: TriggerType, answers: Vec<AnswerInput>) -> SubmitExamRequest {
    SubmitExamRequest {
        attempt_id: attempt_id.to_string(),
        trigger_type: trigger,
        answers,
        time_left: Some(0),
    }
}

fn authorize(students: &[&str]) -> AuthorizeStudentsRequest {
    AuthorizeStudentsRequest {
        academic_session_id: SESSION.into(),
        term: Term::FirstTerm,
        subject_id: MATH.into(),
        student_ids: students.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::test]
async fn timetable_enforces_buffer_between_same_day_subjects() {
    let world = world().await;
    world
        .state
        .exam_definition_service
        .create(exam_request())
        .await
        .unwrap();

    let rejected = world
        .state
        .timetable_service
        .create_timetable(
            CLASS,
            timetable_request(vec![slot(MATH, math_start(), 60), slot(ENGLISH, at(10, 9, 50), 60)]),
        )
        .await
        .unwrap_err();
    match rejected {
        AppError::SchedulingViolation { subject_id, earliest_start, .. } => {
            assert_eq!(subject_id.as_deref(), Some(ENGLISH));
            assert_eq!(earliest_start, Some(at(10, 10, 15)));
        }
        other => panic!("expected scheduling violation, got {:?}", other),
    }

    let timetable = world
        .state
        .timetable_service
        .create_timetable(
            CLASS,
            timetable_request(vec![slot(MATH, math_start(), 60), slot(ENGLISH, at(10, 10, 15), 60)]),
        )
        .await
        .unwrap();
    assert_eq!(timetable.scheduled_subjects.len(), 2);

    let duplicate = world
        .state
        .timetable_service
        .create_timetable(CLASS, timetable_request(vec![slot(MATH, at(11, 9, 0), 60)]))
        .await
        .unwrap_err();
    assert!(matches!(duplicate, AppError::Conflict(_)));
}

#[tokio::test]
async fn timetable_needs_an_active_exam_definition() {
    let world = world().await;
    let err = world
        .state
        .timetable_service
        .create_timetable(CLASS, timetable_request(vec![slot(MATH, math_start(), 60)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let definition = world
        .state
        .exam_definition_service
        .create(exam_request())
        .await
        .unwrap();
    world
        .state
        .exam_definition_service
        .deactivate(&definition.id)
        .await
        .unwrap();
    let err = world
        .state
        .timetable_service
        .create_timetable(CLASS, timetable_request(vec![slot(MATH, math_start(), 60)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[tokio::test]
async fn definition_is_frozen_once_a_timetable_uses_it() {
    let world = world().await;
    let (definition, _) = scheduled(&world).await;

    let err = world
        .state
        .exam_definition_service
        .update(
            &definition.id,
            cbt_server::models::dto::request::UpdateExamDefinitionRequest {
                title: Some("Renamed".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn question_pool_is_checked_against_definition_bounds() {
    let world = world().await;
    let (definition, timetable) = scheduled(&world).await;
    let bank = &world.state.question_bank_service;

    let err = bank
        .bind_questions(MATH_TEACHER, CLASS, MATH, bind_request(pool(15)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let mut short_option = pool(25);
    short_option[10].options.truncate(3);
    let err = bank
        .bind_questions(MATH_TEACHER, CLASS, MATH, bind_request(short_option))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let set = bank
        .bind_questions(MATH_TEACHER, CLASS, MATH, bind_request(pool(25)))
        .await
        .unwrap();
    assert_eq!(set.obj_questions.len(), 25);
    assert_eq!(set.exam_id, definition.id);
    assert_eq!(set.window.start_time, math_start());
    assert_eq!(set.window.initial_cutoff_time, at(10, 9, 10));
    assert_eq!(set.window.final_cutoff_time, at(10, 10, 5));
    assert_eq!(set.created_at, Some(at(1, 8, 0)));

    let stored = TimetableRepository::find_for_class_term(world.store.as_ref(), CLASS, SESSION, Term::FirstTerm)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, timetable.id);
    assert!(stored.entry(MATH).unwrap().is_subject_question_set);
    assert!(!stored.entry(ENGLISH).unwrap().is_subject_question_set);

    let err = bank
        .bind_questions(MATH_TEACHER, CLASS, MATH, bind_request(pool(30)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn only_the_subject_teacher_binds_questions() {
    let world = world().await;
    scheduled(&world).await;

    let err = world
        .state
        .question_bank_service
        .bind_questions("someone-else", CLASS, MATH, bind_request(pool(25)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err = world
        .state
        .question_bank_service
        .bind_questions(MATH_TEACHER, CLASS, "physics", bind_request(pool(25)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}

#[tokio::test]
async fn authorization_follows_class_teacher_and_window_rules() {
    let world = world().await;
    let (definition, _) = with_math_questions(&world).await;
    let gate = &world.state.authorization_service;

    world.clock.set(math_start() - Duration::minutes(1));
    match gate.authorize_students(CLASS_TEACHER, CLASS, authorize(&["student-1"])).await {
        Err(AppError::WindowViolation { boundary, .. }) => assert_eq!(boundary, math_start()),
        other => panic!("expected window violation, got {:?}", other),
    }

    world.clock.set(math_start() + Duration::minutes(1));
    let err = gate
        .authorize_students(MATH_TEACHER, CLASS, authorize(&["student-1"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err = gate
        .authorize_students(CLASS_TEACHER, CLASS, authorize(&["student-1", "student-1"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let err = gate
        .authorize_students(CLASS_TEACHER, CLASS, authorize(&["stranger"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));

    let outcome = gate
        .authorize_students(CLASS_TEACHER, CLASS, authorize(&["student-1", "student-2"]))
        .await
        .unwrap();
    assert_eq!(outcome.newly_authorized.len(), 2);

    let outcome = gate
        .authorize_students(CLASS_TEACHER, CLASS, authorize(&["student-2", "student-3"]))
        .await
        .unwrap();
    assert_eq!(outcome.newly_authorized, vec!["student-3".to_string()]);
    assert_eq!(outcome.already_authorized, vec!["student-2".to_string()]);

    let err = gate
        .authorize_students(CLASS_TEACHER, CLASS, authorize(&["student-1", "student-3"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let key = cbt_server::models::domain::SubjectExamKey {
        exam_id: definition.id.clone(),
        academic_session_id: SESSION.into(),
        class_id: CLASS.into(),
        subject_id: MATH.into(),
        term: Term::FirstTerm,
    };
    let set = QuestionSetRepository::find_by_key(world.store.as_ref(), &key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(set.allowed_students.len(), 3);
    let timetable = TimetableRepository::find_for_class_term(world.store.as_ref(), CLASS, SESSION, Term::FirstTerm)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(timetable.entry(MATH).unwrap().authorized_students.len(), 3);

    world.clock.set(at(10, 10, 6));
    let err = gate
        .authorize_students(CLASS_TEACHER, CLASS, authorize(&["student-4"]))
        .await
        .unwrap_err();
    match err {
        AppError::WindowViolation { boundary, .. } => assert_eq!(boundary, at(10, 10, 5)),
        other => panic!("expected window violation, got {:?}", other),
    }
}

#[tokio::test]
async fn unauthorized_student_cannot_start_until_authorized() {
    let world = world().await;
    with_math_questions(&world).await;
    world.clock.set(math_start() + Duration::minutes(3));
    let attempts = &world.state.exam_attempt_service;

    let err = attempts.start("student-1", start_request()).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    world
        .state
        .authorization_service
        .authorize_students(CLASS_TEACHER, CLASS, authorize(&["student-1"]))
        .await
        .unwrap();

    let view = attempts.start("student-1", start_request()).await.unwrap();
    assert_eq!(view.status, AttemptStatus::InProgress);
    assert_eq!(view.questions.len(), 10);
    assert_eq!(view.obj_total_time_allocated, 3600);
    let numbers: Vec<i32> = view.questions.iter().map(|q| q.question_number).collect();
    assert_eq!(numbers, (1..=10).collect::<Vec<_>>());

    let json = serde_json::to_value(&view).unwrap();
    for question in json["questions"].as_array().unwrap() {
        assert!(question.get("correct_answer").is_none());
        assert!(question.get("score").is_none());
    }

    let timetable = TimetableRepository::find_for_class_term(world.store.as_ref(), CLASS, SESSION, Term::FirstTerm)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        timetable.entry(MATH).unwrap().students_that_have_started,
        vec!["student-1".to_string()]
    );
}

#[tokio::test]
async fn repeated_start_resumes_the_same_attempt() {
    let world = world().await;
    exam_in_progress(&world, &["student-1"]).await;
    let attempts = &world.state.exam_attempt_service;

    let first = attempts.start("student-1", start_request()).await.unwrap();
    world.clock.advance(Duration::minutes(5));
    let second = attempts.start("student-1", start_request()).await.unwrap();

    assert_eq!(first.attempt_id, second.attempt_id);
    assert_eq!(first.questions, second.questions);
}

#[tokio::test]
async fn start_outside_the_window_reports_the_boundary() {
    let world = world().await;
    exam_in_progress(&world, &["student-1"]).await;

    world.clock.set(at(10, 10, 6));
    match world.state.exam_attempt_service.start("student-1", start_request()).await {
        Err(AppError::WindowViolation { boundary, .. }) => assert_eq!(boundary, at(10, 10, 5)),
        other => panic!("expected window violation, got {:?}", other),
    }
}

#[tokio::test]
async fn submission_is_accepted_within_grace_and_rejected_after() {
    let world = world().await;
    exam_in_progress(&world, &["student-1", "student-2"]).await;
    let attempts = &world.state.exam_attempt_service;

    let first = attempts.start("student-1", start_request()).await.unwrap();
    let second = attempts.start("student-2", start_request()).await.unwrap();
    let final_cutoff = first.window.final_cutoff_time;

    world.clock.set(final_cutoff + Duration::minutes(1));
    let outcome = attempts
        .submit("student-1", submit_request(&first.attempt_id, TriggerType::TimeExpired, vec![]))
        .await
        .unwrap();
    assert_eq!(outcome.status, AttemptStatus::Submitted);
    assert_eq!(outcome.trigger, TriggerType::TimeExpired);

    world.clock.set(final_cutoff + Duration::minutes(6));
    match attempts
        .submit("student-2", submit_request(&second.attempt_id, TriggerType::TimeExpired, vec![]))
        .await
    {
        Err(AppError::WindowViolation { boundary, .. }) => {
            assert_eq!(boundary, final_cutoff + Duration::minutes(5))
        }
        other => panic!("expected window violation, got {:?}", other),
    }
    assert_eq!(
        stored_attempt(&world, &second.attempt_id).await.obj_status,
        AttemptStatus::InProgress
    );
}

#[tokio::test]
async fn scoring_writes_weighted_score_once() {
    let world = world().await;
    exam_in_progress(&world, &["student-1"]).await;
    let attempts = &world.state.exam_attempt_service;

    let view = attempts.start("student-1", start_request()).await.unwrap();
    let record = stored_attempt(&world, &view.attempt_id).await;
    let mut answers = correct_answers(&record);
    answers[0].selected_answer = Some("definitely wrong".into());
    answers.pop();

    let outcome = attempts
        .submit("student-1", submit_request(&view.attempt_id, TriggerType::ManualSubmit, answers.clone()))
        .await
        .unwrap();
    assert_eq!(outcome.raw_score, 8);
    assert_eq!(outcome.max_score, 10);
    assert!((outcome.raw_percentage - 80.0).abs() < 1e-9);
    assert!((outcome.weighted_score - 48.0).abs() < 1e-9);

    let err = attempts
        .submit("student-1", submit_request(&view.attempt_id, TriggerType::ManualSubmit, answers))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    let err = attempts.start("student-1", start_request()).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let subject_result = ResultRepository::find_subject_result(world.store.as_ref(), "student-1", CLASS, SESSION, MATH)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(subject_result.term_results.len(), 1);
    assert_eq!(subject_result.term_results[0].exam_object.len(), 1);
    assert!((subject_result.term_results[0].exam_object[0].score - 48.0).abs() < 1e-9);

    let student_result = ResultRepository::find_student_result(world.store.as_ref(), "student-1", CLASS, SESSION)
        .await
        .unwrap()
        .unwrap();
    let summary = student_result.subject(Term::FirstTerm, MATH).unwrap();
    assert_eq!(summary.exam_object.len(), 1);
    assert_eq!(summary.subject_teacher_id, MATH_TEACHER);

    let stored = stored_attempt(&world, &view.attempt_id).await;
    assert_eq!(stored.obj_status, AttemptStatus::Submitted);
    assert_eq!(stored.objective_total_score, Some(8));
    assert_eq!(stored.shuffled_obj_questions[0].student_score, Some(0));

    let timetable = TimetableRepository::find_for_class_term(world.store.as_ref(), CLASS, SESSION, Term::FirstTerm)
        .await
        .unwrap()
        .unwrap();
    let entry = timetable.entry(MATH).unwrap();
    assert!(entry.students_that_have_started.is_empty());
    assert_eq!(entry.students_that_have_submitted, vec!["student-1".to_string()]);
}

#[tokio::test]
async fn full_marks_contribute_the_whole_weight() {
    let world = world().await;
    exam_in_progress(&world, &["student-1"]).await;
    let attempts = &world.state.exam_attempt_service;

    let view = attempts.start("student-1", start_request()).await.unwrap();
    let record = stored_attempt(&world, &view.attempt_id).await;
    let outcome = attempts
        .submit(
            "student-1",
            submit_request(&view.attempt_id, TriggerType::ManualSubmit, correct_answers(&record)),
        )
        .await
        .unwrap();
    assert_eq!(outcome.raw_score, outcome.max_score);
    assert!((outcome.weighted_score - OBJ_WEIGHT).abs() < 1e-9);
}

#[tokio::test]
async fn submission_queues_recomputation_jobs() {
    let world = world().await;
    exam_in_progress(&world, &["student-1"]).await;
    let attempts = &world.state.exam_attempt_service;

    let view = attempts.start("student-1", start_request()).await.unwrap();
    attempts
        .submit("student-1", submit_request(&view.attempt_id, TriggerType::ManualSubmit, vec![]))
        .await
        .unwrap();

    let mut jobs = Vec::new();
    for _ in 0..50 {
        jobs = world.store.recomputation_jobs().await;
        if jobs.len() == 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|j| j.key.student_id == "student-1" && j.key.subject_id == MATH));
}

#[tokio::test]
async fn failed_commit_leaves_no_partial_submission() {
    let world = world().await;
    exam_in_progress(&world, &["student-1"]).await;
    let attempts = &world.state.exam_attempt_service;
    let view = attempts.start("student-1", start_request()).await.unwrap();

    world.store.set_fail_commits(true);
    let err = attempts
        .submit("student-1", submit_request(&view.attempt_id, TriggerType::ManualSubmit, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DatabaseError(_)));

    assert_eq!(
        stored_attempt(&world, &view.attempt_id).await.obj_status,
        AttemptStatus::InProgress
    );
    assert!(ResultRepository::find_student_result(world.store.as_ref(), "student-1", CLASS, SESSION)
        .await
        .unwrap()
        .is_none());

    world.store.set_fail_commits(false);
    let outcome = attempts
        .submit("student-1", submit_request(&view.attempt_id, TriggerType::ManualSubmit, vec![]))
        .await
        .unwrap();
    assert_eq!(outcome.status, AttemptStatus::Submitted);
}

#[tokio::test]
async fn concurrent_answer_syncs_on_distinct_questions_both_apply() {
    let world = world().await;
    exam_in_progress(&world, &["student-1"]).await;
    let attempts = &world.state.exam_attempt_service;

    let view = attempts.start("student-1", start_request()).await.unwrap();
    let first_id = view.questions[0].question_id.clone();
    let second_id = view.questions[1].question_id.clone();
    let first_answer = view.questions[0].options[2].clone();
    let second_answer = view.questions[1].options[1].clone();

    let (a, b) = tokio::join!(
        attempts.sync_answers(
            "student-1",
            UpdateAnswersRequest {
                attempt_id: view.attempt_id.clone(),
                answers: vec![AnswerInput {
                    question_id: first_id.clone(),
                    selected_answer: Some(first_answer.clone()),
                }],
            },
        ),
        attempts.sync_answers(
            "student-1",
            UpdateAnswersRequest {
                attempt_id: view.attempt_id.clone(),
                answers: vec![AnswerInput {
                    question_id: second_id.clone(),
                    selected_answer: Some(second_answer.clone()),
                }],
            },
        ),
    );
    assert_eq!(a.unwrap().applied, 1);
    assert_eq!(b.unwrap().applied, 1);

    let stored = stored_attempt(&world, &view.attempt_id).await;
    let selected = |id: &str| {
        stored
            .shuffled_obj_questions
            .iter()
            .find(|q| q.question_id == id)
            .and_then(|q| q.selected_answer.clone())
    };
    assert_eq!(selected(&first_id), Some(first_answer));
    assert_eq!(selected(&second_id), Some(second_answer));
}

#[tokio::test]
async fn answer_sync_ignores_unknown_questions_and_closed_windows() {
    let world = world().await;
    exam_in_progress(&world, &["student-1"]).await;
    let attempts = &world.state.exam_attempt_service;
    let view = attempts.start("student-1", start_request()).await.unwrap();

    let ack = attempts
        .sync_answers(
            "student-1",
            UpdateAnswersRequest {
                attempt_id: view.attempt_id.clone(),
                answers: vec![
                    AnswerInput {
                        question_id: "not-on-this-paper".into(),
                        selected_answer: Some("x".into()),
                    },
                    AnswerInput {
                        question_id: view.questions[3].question_id.clone(),
                        selected_answer: Some(view.questions[3].options[0].clone()),
                    },
                ],
            },
        )
        .await
        .unwrap();
    assert_eq!(ack.applied, 1);

    let err = attempts
        .sync_answers(
            "student-2",
            UpdateAnswersRequest {
                attempt_id: view.attempt_id.clone(),
                answers: vec![],
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    world.clock.set(view.window.final_cutoff_time + Duration::seconds(1));
    let err = attempts
        .sync_time(
            "student-1",
            UpdateTimeRequest {
                attempt_id: view.attempt_id.clone(),
                remaining_time: 30,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::WindowViolation { .. }));
}

#[tokio::test]
async fn time_sync_overwrites_the_checkpoint() {
    let world = world().await;
    exam_in_progress(&world, &["student-1"]).await;
    let attempts = &world.state.exam_attempt_service;
    let view = attempts.start("student-1", start_request()).await.unwrap();

    attempts
        .sync_time(
            "student-1",
            UpdateTimeRequest {
                attempt_id: view.attempt_id.clone(),
                remaining_time: 1200,
            },
        )
        .await
        .unwrap();
    assert_eq!(stored_attempt(&world, &view.attempt_id).await.obj_time_left, 1200);
}

#[tokio::test]
async fn force_end_waits_for_the_final_cutoff() {
    let world = world().await;
    exam_in_progress(&world, &["student-1"]).await;
    let attempts = &world.state.exam_attempt_service;
    let view = attempts.start("student-1", start_request()).await.unwrap();

    let err = attempts
        .force_end(ForceEndRequest {
            attempt_id: view.attempt_id.clone(),
        })
        .await
        .unwrap_err();
    match err {
        AppError::WindowViolation { boundary, .. } => {
            assert_eq!(boundary, view.window.final_cutoff_time)
        }
        other => panic!("expected window violation, got {:?}", other),
    }

    world.clock.set(view.window.final_cutoff_time + Duration::minutes(2));
    let outcome = attempts
        .force_end(ForceEndRequest {
            attempt_id: view.attempt_id.clone(),
        })
        .await
        .unwrap();
    assert_eq!(outcome.status, AttemptStatus::ForceEnded);
    assert_eq!(outcome.trigger, TriggerType::ForcedClose);
}

#[tokio::test]
async fn timetables_are_readable_per_term_and_per_class() {
    let world = world().await;
    let (_, created) = scheduled(&world).await;
    let timetables = &world.state.timetable_service;

    let fetched = timetables
        .get_for_term(CLASS, SESSION, Term::FirstTerm)
        .await
        .unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.created_at, Some(at(1, 8, 0)));
    assert_eq!(fetched.entry(ENGLISH).unwrap().start_time, at(10, 11, 0));

    let all = timetables.list_for_class(CLASS).await.unwrap();
    assert_eq!(all.len(), 1);

    let err = timetables
        .get_for_term(CLASS, SESSION, Term::SecondTerm)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn absurd_slot_duration_is_a_validation_error() {
    let world = world().await;
    world
        .state
        .exam_definition_service
        .create(exam_request())
        .await
        .unwrap();

    let mut huge = slot(MATH, math_start(), 60);
    huge.duration = 1_000_000_000_000_000;
    let err = world
        .state
        .timetable_service
        .create_timetable(CLASS, timetable_request(vec![huge, slot(ENGLISH, at(10, 11, 0), 60)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}
