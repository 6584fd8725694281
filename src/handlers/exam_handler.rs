use std::sync::Arc;

use actix_web::{get, post, put, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::{require_admin, AuthenticatedUser},
    errors::AppError,
    models::{
        domain::Term,
        dto::request::{
            CreateExamDefinitionRequest, ExamDefinitionSearchParams, UpdateExamDefinitionRequest,
        },
    },
};

#[post("/exams")]
async fn create_exam(
    state: web::Data<Arc<AppState>>,
    request: web::Json<CreateExamDefinitionRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth.0)?;

    let definition = state
        .exam_definition_service
        .create(request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(definition))
}

#[get("/exams")]
async fn list_exams(
    state: web::Data<Arc<AppState>>,
    query: web::Query<ExamDefinitionSearchParams>,
    _auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let page = state.exam_definition_service.list(query.into_inner()).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/exams/{id}")]
async fn get_exam(
    state: web::Data<Arc<AppState>>,
    id: web::Path<String>,
    _auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let definition = state.exam_definition_service.get(&id).await?;
    Ok(HttpResponse::Ok().json(definition))
}

#[get("/sessions/{session_id}/terms/{term}/exam")]
async fn get_exam_for_term(
    state: web::Data<Arc<AppState>>,
    path: web::Path<(String, Term)>,
    _auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    let (session_id, term) = path.into_inner();
    let definition = state
        .exam_definition_service
        .get_for_term(&session_id, term)
        .await?;
    Ok(HttpResponse::Ok().json(definition))
}

#[put("/exams/{id}")]
async fn update_exam(
    state: web::Data<Arc<AppState>>,
    id: web::Path<String>,
    request: web::Json<UpdateExamDefinitionRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth.0)?;

    let definition = state
        .exam_definition_service
        .update(&id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(definition))
}

#[post("/exams/{id}/deactivate")]
async fn deactivate_exam(
    state: web::Data<Arc<AppState>>,
    id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth.0)?;

    let definition = state.exam_definition_service.deactivate(&id).await?;
    Ok(HttpResponse::Ok().json(definition))
}
