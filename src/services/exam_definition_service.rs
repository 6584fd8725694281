use std::sync::Arc;

use validator::Validate;

use crate::{
    errors::{AppError, AppResult},
    models::{
        domain::{ExamDefinition, Term},
        dto::{
            request::{
                CreateExamDefinitionRequest, ExamDefinitionSearchParams,
                UpdateExamDefinitionRequest,
            },
            response::PaginatedResponse,
        },
    },
    repositories::{ExamDefinitionRepository, SchoolDirectory, TimetableRepository},
};

pub struct ExamDefinitionService {
    repository: Arc<dyn ExamDefinitionRepository>,
    timetables: Arc<dyn TimetableRepository>,
    directory: Arc<dyn SchoolDirectory>,
}

impl ExamDefinitionService {
    pub fn new(
        repository: Arc<dyn ExamDefinitionRepository>,
        timetables: Arc<dyn TimetableRepository>,
        directory: Arc<dyn SchoolDirectory>,
    ) -> Self {
        Self {
            repository,
            timetables,
            directory,
        }
    }

    pub async fn create(&self, request: CreateExamDefinitionRequest) -> AppResult<ExamDefinition> {
        request.validate()?;

        let title = request.title.trim();
        if title.is_empty() {
            return Err(AppError::ValidationError("Exam title cannot be blank".to_string()));
        }

        let session = self
            .directory
            .find_session(&request.academic_session_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Academic session {}", request.academic_session_id))
            })?;
        if !session.is_term_active(request.term) {
            return Err(AppError::InvalidState(format!(
                "{} of session {} is not active",
                request.term, session.name
            )));
        }

        if self
            .repository
            .find_by_session_term(&request.academic_session_id, request.term)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(format!(
                "An exam already exists for {} of session {}",
                request.term, session.name
            )));
        }

        let definition = ExamDefinition::new(
            &request.academic_session_id,
            request.term,
            title,
            request.bounds(),
        )?;
        let definition = self.repository.create(definition).await?;

        log::info!(
            "Created exam definition {} for session {} {}",
            definition.id,
            definition.academic_session_id,
            definition.term
        );
        Ok(definition)
    }

    pub async fn get(&self, id: &str) -> AppResult<ExamDefinition> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam with id '{}' not found", id)))
    }

    pub async fn get_for_term(&self, academic_session_id: &str, term: Term) -> AppResult<ExamDefinition> {
        self.repository
            .find_by_session_term(academic_session_id, term)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No exam for {} of session {}",
                    term, academic_session_id
                ))
            })
    }

    pub async fn list(
        &self,
        params: ExamDefinitionSearchParams,
    ) -> AppResult<PaginatedResponse<ExamDefinition>> {
        params.validate()?;

        let (offset, limit) = (params.offset(), params.limit());
        let (items, total) = self
            .repository
            .list(params.search.as_deref(), offset, limit)
            .await?;

        Ok(PaginatedResponse {
            items,
            total,
            offset,
            limit,
        })
    }

    /// Changes title or question bounds. Refused once a timetable references the exam.
    pub async fn update(
        &self,
        id: &str,
        request: UpdateExamDefinitionRequest,
    ) -> AppResult<ExamDefinition> {
        request.validate()?;

        let mut definition = self.get(id).await?;
        if self.timetables.exists_for_exam(id).await? {
            return Err(AppError::Conflict(
                "Exam is already referenced by a timetable and can no longer be changed".to_string(),
            ));
        }

        if let Some(title) = &request.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(AppError::ValidationError("Exam title cannot be blank".to_string()));
            }
            definition.title = title.to_string();
        }
        definition.apply_bounds(request.merge_into(definition.bounds()))?;

        let definition = self.repository.update(definition).await?;
        log::info!("Updated exam definition {}", definition.id);
        Ok(definition)
    }

    pub async fn deactivate(&self, id: &str) -> AppResult<ExamDefinition> {
        let mut definition = self.get(id).await?;
        if !definition.is_active {
            return Ok(definition);
        }

        definition.is_active = false;
        definition.modified_at = Some(chrono::Utc::now());
        let definition = self.repository.update(definition).await?;

        log::info!("Deactivated exam definition {}", definition.id);
        Ok(definition)
    }
}
