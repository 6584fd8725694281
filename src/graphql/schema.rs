use std::future::Future;

use async_graphql::{
    Context, EmptyMutation, EmptySubscription, ErrorExtensions, Object, Schema as GraphQLSchema,
};

use crate::{
    app_state::AppState,
    auth::{extract_claims_from_context, require_role, Role},
    errors::AppResult,
    models::{
        domain::{ExamDefinition, Term, Timetable},
        dto::{request::ExamDefinitionSearchParams, response::AttemptView},
    },
};

pub type Schema = GraphQLSchema<QueryRoot, EmptyMutation, EmptySubscription>;

/// Runs a resolver body and attaches the error `code` extension on failure.
async fn resolve<T>(body: impl Future<Output = AppResult<T>>) -> async_graphql::Result<T> {
    body.await.map_err(|e| e.extend())
}

/// Read-only view over exams, timetables and the caller's own attempts.
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn exam_definition(
        &self,
        ctx: &Context<'_>,
        id: String,
    ) -> async_graphql::Result<ExamDefinition> {
        resolve(async {
            extract_claims_from_context(ctx)?;
            let state = ctx.data::<AppState>()?;
            state.exam_definition_service.get(&id).await
        })
        .await
    }

    async fn exam_definitions(
        &self,
        ctx: &Context<'_>,
        search: Option<String>,
        offset: Option<i64>,
        limit: Option<i64>,
    ) -> async_graphql::Result<Vec<ExamDefinition>> {
        resolve(async {
            extract_claims_from_context(ctx)?;
            let state = ctx.data::<AppState>()?;
            let page = state
                .exam_definition_service
                .list(ExamDefinitionSearchParams {
                    search,
                    offset,
                    limit,
                })
                .await?;
            Ok(page.items)
        })
        .await
    }

    async fn class_timetable(
        &self,
        ctx: &Context<'_>,
        class_id: String,
        academic_session_id: String,
        term: Term,
    ) -> async_graphql::Result<Timetable> {
        resolve(async {
            let claims = extract_claims_from_context(ctx)?;
            require_role(&claims, &[Role::SuperAdmin, Role::Admin, Role::Teacher])?;
            let state = ctx.data::<AppState>()?;
            state
                .timetable_service
                .get_for_term(&class_id, &academic_session_id, term)
                .await
        })
        .await
    }

    /// `not_started`, `in_progress`, `submitted` or `force_ended`.
    async fn my_attempt_status(
        &self,
        ctx: &Context<'_>,
        academic_session_id: String,
        class_id: String,
        subject_id: String,
        term: Term,
    ) -> async_graphql::Result<String> {
        resolve(async {
            let claims = extract_claims_from_context(ctx)?;
            require_role(&claims, &[Role::Student])?;
            let state = ctx.data::<AppState>()?;
            let attempt_state = state
                .exam_attempt_service
                .attempt_state(&claims.sub, &academic_session_id, &class_id, &subject_id, term)
                .await?;
            Ok(attempt_state.label().to_string())
        })
        .await
    }

    async fn my_attempt(
        &self,
        ctx: &Context<'_>,
        attempt_id: String,
    ) -> async_graphql::Result<AttemptView> {
        resolve(async {
            let claims = extract_claims_from_context(ctx)?;
            require_role(&claims, &[Role::Student])?;
            let state = ctx.data::<AppState>()?;
            state.exam_attempt_service.get_attempt(&claims.sub, &attempt_id).await
        })
        .await
    }
}

pub fn create_schema(app_state: AppState) -> Schema {
    GraphQLSchema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(app_state)
        .finish()
}
