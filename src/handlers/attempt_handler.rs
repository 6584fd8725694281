use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::{require_admin, require_role, AuthenticatedUser, Role},
    errors::AppError,
    models::dto::request::{
        ForceEndRequest, StartExamRequest, SubmitExamRequest, UpdateAnswersRequest,
        UpdateTimeRequest,
    },
    realtime::Envelope,
};

#[post("/attempts/start")]
async fn start_exam(
    state: web::Data<Arc<AppState>>,
    request: web::Json<StartExamRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &[Role::Student])?;

    let view = state
        .exam_attempt_service
        .start(&auth.0.sub, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

#[post("/attempts/answers")]
async fn update_answers(
    state: web::Data<Arc<AppState>>,
    request: web::Json<UpdateAnswersRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &[Role::Student])?;

    let ack = state
        .exam_attempt_service
        .sync_answers(&auth.0.sub, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ack))
}

#[post("/attempts/time")]
async fn update_time(
    state: web::Data<Arc<AppState>>,
    request: web::Json<UpdateTimeRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &[Role::Student])?;

    let ack = state
        .exam_attempt_service
        .sync_time(&auth.0.sub, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ack))
}

#[post("/attempts/submit")]
async fn submit_exam(
    state: web::Data<Arc<AppState>>,
    request: web::Json<SubmitExamRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &[Role::Student])?;

    let outcome = state
        .exam_attempt_service
        .submit(&auth.0.sub, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[post("/attempts/force-end")]
async fn force_end_exam(
    state: web::Data<Arc<AppState>>,
    request: web::Json<ForceEndRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth.0)?;

    let outcome = state
        .exam_attempt_service
        .force_end(request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

#[get("/attempts/{attempt_id}")]
async fn get_attempt(
    state: web::Data<Arc<AppState>>,
    attempt_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &[Role::Student])?;

    let view = state
        .exam_attempt_service
        .get_attempt(&auth.0.sub, &attempt_id)
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Batch of channel envelopes; each gets its own reply, in order.
#[post("/channel")]
async fn channel(
    state: web::Data<Arc<AppState>>,
    envelopes: web::Json<Vec<Envelope>>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &[Role::Student])?;

    let replies = state
        .channel
        .handle_all(&auth.0.sub, envelopes.into_inner())
        .await;
    Ok(HttpResponse::Ok().json(replies))
}
