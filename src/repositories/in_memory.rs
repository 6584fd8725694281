//! Process-local storage backend. Every trait the services depend on is
//! implemented here over one shared state. A unit of work holds the write lock
//! for its lifetime, stages writes on a copy, and swaps the copy in on commit.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    errors::{AppError, AppResult},
    models::domain::{
        timetable::{add_to_set, pull_from_set},
        AcademicSession, AnswerUpdate, AttemptKey, AttemptStatus, ClassEnrolment, ExamAttempt,
        ExamDefinition, ParticipationSet, QuestionSet, RecomputationJob, ResultSetting,
        SchoolClass, StudentResult, SubjectExamKey, SubjectResult, Term, Timetable,
    },
    repositories::{
        ExamAttemptRepository, ExamDefinitionRepository, QuestionSetRepository,
        RecomputationQueue, ResultRepository, SchoolDirectory, TimetableRepository,
        TransactionManager, UnitOfWork,
    },
};

#[derive(Clone, Default)]
struct MemoryState {
    exam_definitions: HashMap<String, ExamDefinition>,
    timetables: HashMap<String, Timetable>,
    question_sets: HashMap<String, QuestionSet>,
    attempts: HashMap<String, ExamAttempt>,
    subject_results: HashMap<String, SubjectResult>,
    student_results: HashMap<String, StudentResult>,
    recomputation_jobs: Vec<RecomputationJob>,
    sessions: HashMap<String, AcademicSession>,
    classes: HashMap<String, SchoolClass>,
    enrolments: Vec<ClassEnrolment>,
    result_settings: HashMap<String, ResultSetting>,
}

impl MemoryState {
    fn timetable_for(&self, class_id: &str, academic_session_id: &str, term: Term) -> Option<&Timetable> {
        self.timetables.values().find(|t| {
            t.class_id == class_id && t.academic_session_id == academic_session_id && t.term == term
        })
    }

    fn question_set_for(&self, key: &SubjectExamKey) -> Option<&QuestionSet> {
        self.question_sets.values().find(|s| &s.key() == key)
    }

    fn question_set_for_mut(&mut self, key: &SubjectExamKey) -> Option<&mut QuestionSet> {
        self.question_sets.values_mut().find(|s| &s.key() == key)
    }

    fn attempt_for(&self, key: &AttemptKey) -> Option<&ExamAttempt> {
        self.attempts.values().find(|a| &a.key() == key)
    }

    fn timetable_entry_mut(
        &mut self,
        timetable_id: &str,
        subject_id: &str,
    ) -> AppResult<&mut crate::models::domain::TimetableEntry> {
        self.timetables
            .get_mut(timetable_id)
            .and_then(|t| t.entry_mut(subject_id))
            .ok_or_else(|| {
                AppError::NotFound(format!("Subject {} in timetable {}", subject_id, timetable_id))
            })
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    fail_commits: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_session(&self, session: AcademicSession) {
        self.state.write().await.sessions.insert(session.id.clone(), session);
    }

    pub async fn insert_class(&self, class: SchoolClass) {
        self.state.write().await.classes.insert(class.id.clone(), class);
    }

    pub async fn insert_enrolment(&self, enrolment: ClassEnrolment) {
        self.state.write().await.enrolments.push(enrolment);
    }

    pub async fn insert_result_setting(&self, setting: ResultSetting) {
        self.state
            .write()
            .await
            .result_settings
            .insert(setting.level.clone(), setting);
    }

    pub async fn recomputation_jobs(&self) -> Vec<RecomputationJob> {
        self.state.read().await.recomputation_jobs.clone()
    }

    /// When set, every commit fails after discarding its staged writes.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ExamDefinitionRepository for InMemoryStore {
    async fn create(&self, definition: ExamDefinition) -> AppResult<ExamDefinition> {
        let mut state = self.state.write().await;
        let duplicate = state.exam_definitions.values().any(|d| {
            d.academic_session_id == definition.academic_session_id && d.term == definition.term
        });
        if duplicate || state.exam_definitions.contains_key(&definition.id) {
            return Err(AppError::Conflict(format!(
                "An exam already exists for {} of this session",
                definition.term
            )));
        }
        state
            .exam_definitions
            .insert(definition.id.clone(), definition.clone());
        Ok(definition)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<ExamDefinition>> {
        Ok(self.state.read().await.exam_definitions.get(id).cloned())
    }

    async fn find_by_session_term(
        &self,
        academic_session_id: &str,
        term: Term,
    ) -> AppResult<Option<ExamDefinition>> {
        let state = self.state.read().await;
        Ok(state
            .exam_definitions
            .values()
            .find(|d| d.academic_session_id == academic_session_id && d.term == term)
            .cloned())
    }

    async fn list(
        &self,
        search: Option<&str>,
        offset: i64,
        limit: i64,
    ) -> AppResult<(Vec<ExamDefinition>, i64)> {
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let state = self.state.read().await;
        let mut items: Vec<_> = state
            .exam_definitions
            .values()
            .filter(|d| match &needle {
                Some(needle) => {
                    d.title.to_lowercase().contains(needle) || d.term.as_str().contains(needle)
                }
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let total = items.len() as i64;
        let page = items
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn update(&self, definition: ExamDefinition) -> AppResult<ExamDefinition> {
        let mut state = self.state.write().await;
        match state.exam_definitions.get_mut(&definition.id) {
            Some(existing) => {
                *existing = definition.clone();
                Ok(definition)
            }
            None => Err(AppError::NotFound(format!("Exam {}", definition.id))),
        }
    }
}

#[async_trait]
impl TimetableRepository for InMemoryStore {
    async fn find_for_class_term(
        &self,
        class_id: &str,
        academic_session_id: &str,
        term: Term,
    ) -> AppResult<Option<Timetable>> {
        let state = self.state.read().await;
        Ok(state.timetable_for(class_id, academic_session_id, term).cloned())
    }

    async fn list_for_class(&self, class_id: &str) -> AppResult<Vec<Timetable>> {
        let state = self.state.read().await;
        let mut items: Vec<_> = state
            .timetables
            .values()
            .filter(|t| t.class_id == class_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn exists_for_exam(&self, exam_id: &str) -> AppResult<bool> {
        let state = self.state.read().await;
        Ok(state.timetables.values().any(|t| t.exam_id == exam_id))
    }
}

#[async_trait]
impl QuestionSetRepository for InMemoryStore {
    async fn find_by_key(&self, key: &SubjectExamKey) -> AppResult<Option<QuestionSet>> {
        Ok(self.state.read().await.question_set_for(key).cloned())
    }
}

#[async_trait]
impl ExamAttemptRepository for InMemoryStore {
    async fn find_by_id(&self, id: &str) -> AppResult<Option<ExamAttempt>> {
        Ok(self.state.read().await.attempts.get(id).cloned())
    }

    async fn find_by_key(&self, key: &AttemptKey) -> AppResult<Option<ExamAttempt>> {
        Ok(self.state.read().await.attempt_for(key).cloned())
    }

    async fn apply_answers(&self, attempt_id: &str, answers: &[AnswerUpdate]) -> AppResult<bool> {
        let mut state = self.state.write().await;
        match state.attempts.get_mut(attempt_id) {
            Some(attempt) if attempt.obj_status == AttemptStatus::InProgress => {
                if !answers.is_empty() {
                    attempt.apply_answers(answers);
                    attempt.modified_at = Some(Utc::now());
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_time_left(&self, attempt_id: &str, seconds: i64) -> AppResult<bool> {
        let mut state = self.state.write().await;
        match state.attempts.get_mut(attempt_id) {
            Some(attempt) if attempt.obj_status == AttemptStatus::InProgress => {
                attempt.obj_time_left = seconds;
                attempt.modified_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ResultRepository for InMemoryStore {
    async fn find_subject_result(
        &self,
        student_id: &str,
        class_id: &str,
        academic_session_id: &str,
        subject_id: &str,
    ) -> AppResult<Option<SubjectResult>> {
        let state = self.state.read().await;
        Ok(find_subject_result(&state, student_id, class_id, academic_session_id, subject_id))
    }

    async fn find_student_result(
        &self,
        student_id: &str,
        class_id: &str,
        academic_session_id: &str,
    ) -> AppResult<Option<StudentResult>> {
        let state = self.state.read().await;
        Ok(find_student_result(&state, student_id, class_id, academic_session_id))
    }
}

fn find_subject_result(
    state: &MemoryState,
    student_id: &str,
    class_id: &str,
    academic_session_id: &str,
    subject_id: &str,
) -> Option<SubjectResult> {
    state
        .subject_results
        .values()
        .find(|r| {
            r.student_id == student_id
                && r.class_id == class_id
                && r.academic_session_id == academic_session_id
                && r.subject_id == subject_id
        })
        .cloned()
}

fn find_student_result(
    state: &MemoryState,
    student_id: &str,
    class_id: &str,
    academic_session_id: &str,
) -> Option<StudentResult> {
    state
        .student_results
        .values()
        .find(|r| {
            r.student_id == student_id
                && r.class_id == class_id
                && r.academic_session_id == academic_session_id
        })
        .cloned()
}

#[async_trait]
impl SchoolDirectory for InMemoryStore {
    async fn find_session(&self, academic_session_id: &str) -> AppResult<Option<AcademicSession>> {
        Ok(self.state.read().await.sessions.get(academic_session_id).cloned())
    }

    async fn find_class(&self, class_id: &str) -> AppResult<Option<SchoolClass>> {
        Ok(self.state.read().await.classes.get(class_id).cloned())
    }

    async fn find_enrolment(
        &self,
        class_id: &str,
        academic_session_id: &str,
    ) -> AppResult<Option<ClassEnrolment>> {
        let state = self.state.read().await;
        Ok(state
            .enrolments
            .iter()
            .find(|e| e.class_id == class_id && e.academic_session_id == academic_session_id)
            .cloned())
    }

    async fn find_result_setting(&self, level: &str) -> AppResult<Option<ResultSetting>> {
        Ok(self.state.read().await.result_settings.get(level).cloned())
    }
}

#[async_trait]
impl RecomputationQueue for InMemoryStore {
    async fn enqueue(&self, job: RecomputationJob) -> AppResult<String> {
        let job_id = job.job_id.clone();
        self.state.write().await.recomputation_jobs.push(job);
        Ok(job_id)
    }
}

#[async_trait]
impl TransactionManager for InMemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = Arc::clone(&self.state).write_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork {
            guard,
            staged,
            fail_commit: self.fail_commits.load(Ordering::SeqCst),
        }))
    }
}

pub struct InMemoryUnitOfWork {
    guard: OwnedRwLockWriteGuard<MemoryState>,
    staged: MemoryState,
    fail_commit: bool,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find_timetable(
        &mut self,
        class_id: &str,
        academic_session_id: &str,
        term: Term,
    ) -> AppResult<Option<Timetable>> {
        Ok(self.staged.timetable_for(class_id, academic_session_id, term).cloned())
    }

    async fn insert_timetable(&mut self, timetable: &Timetable) -> AppResult<()> {
        let exists = self
            .staged
            .timetable_for(&timetable.class_id, &timetable.academic_session_id, timetable.term)
            .is_some();
        if exists || self.staged.timetables.contains_key(&timetable.id) {
            return Err(AppError::Conflict(
                "A timetable already exists for this class and term".to_string(),
            ));
        }
        self.staged
            .timetables
            .insert(timetable.id.clone(), timetable.clone());
        Ok(())
    }

    async fn mark_question_set_bound(&mut self, timetable_id: &str, subject_id: &str) -> AppResult<()> {
        self.staged
            .timetable_entry_mut(timetable_id, subject_id)?
            .is_subject_question_set = true;
        Ok(())
    }

    async fn add_participants(
        &mut self,
        timetable_id: &str,
        subject_id: &str,
        set: ParticipationSet,
        student_ids: &[String],
    ) -> AppResult<()> {
        let entry = self.staged.timetable_entry_mut(timetable_id, subject_id)?;
        add_to_set(entry.participants_mut(set), student_ids);
        Ok(())
    }

    async fn move_started_to_submitted(
        &mut self,
        timetable_id: &str,
        subject_id: &str,
        student_id: &str,
    ) -> AppResult<()> {
        let entry = self.staged.timetable_entry_mut(timetable_id, subject_id)?;
        pull_from_set(entry.participants_mut(ParticipationSet::Started), student_id);
        add_to_set(
            entry.participants_mut(ParticipationSet::Submitted),
            &[student_id.to_string()],
        );
        Ok(())
    }

    async fn find_question_set(&mut self, key: &SubjectExamKey) -> AppResult<Option<QuestionSet>> {
        Ok(self.staged.question_set_for(key).cloned())
    }

    async fn save_question_set(&mut self, set: &QuestionSet) -> AppResult<()> {
        let key = set.key();
        self.staged.question_sets.retain(|_, s| s.key() != key);
        self.staged.question_sets.insert(set.id.clone(), set.clone());
        Ok(())
    }

    async fn add_allowed_students(&mut self, key: &SubjectExamKey, student_ids: &[String]) -> AppResult<()> {
        let set = self
            .staged
            .question_set_for_mut(key)
            .ok_or_else(|| AppError::NotFound("Question set".to_string()))?;
        add_to_set(&mut set.allowed_students, student_ids);
        Ok(())
    }

    async fn find_attempt(&mut self, key: &AttemptKey) -> AppResult<Option<ExamAttempt>> {
        Ok(self.staged.attempt_for(key).cloned())
    }

    async fn find_attempt_by_id(&mut self, attempt_id: &str) -> AppResult<Option<ExamAttempt>> {
        Ok(self.staged.attempts.get(attempt_id).cloned())
    }

    async fn insert_attempt(&mut self, attempt: &ExamAttempt) -> AppResult<()> {
        let duplicate = self.staged.attempts.values().any(|a| {
            a.exam_id == attempt.exam_id
                && a.student_id == attempt.student_id
                && a.subject_id == attempt.subject_id
        });
        if duplicate {
            return Err(AppError::Conflict(
                "An attempt already exists for this subject".to_string(),
            ));
        }
        self.staged.attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(())
    }

    async fn close_attempt(&mut self, attempt: &ExamAttempt) -> AppResult<bool> {
        match self.staged.attempts.get_mut(&attempt.id) {
            Some(stored) if stored.obj_status == AttemptStatus::InProgress => {
                *stored = attempt.clone();
                stored.modified_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_subject_result(
        &mut self,
        student_id: &str,
        class_id: &str,
        academic_session_id: &str,
        subject_id: &str,
    ) -> AppResult<Option<SubjectResult>> {
        Ok(find_subject_result(&self.staged, student_id, class_id, academic_session_id, subject_id))
    }

    async fn save_subject_result(&mut self, result: &SubjectResult) -> AppResult<()> {
        self.staged
            .subject_results
            .insert(result.id.clone(), result.clone());
        Ok(())
    }

    async fn find_student_result(
        &mut self,
        student_id: &str,
        class_id: &str,
        academic_session_id: &str,
    ) -> AppResult<Option<StudentResult>> {
        Ok(find_student_result(&self.staged, student_id, class_id, academic_session_id))
    }

    async fn save_student_result(&mut self, result: &StudentResult) -> AppResult<()> {
        self.staged
            .student_results
            .insert(result.id.clone(), result.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let InMemoryUnitOfWork {
            mut guard,
            staged,
            fail_commit,
        } = *self;
        if fail_commit {
            return Err(AppError::DatabaseError("Transaction commit failed".to_string()));
        }
        *guard = staged;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> AppResult<()> {
        Ok(())
    }
}
