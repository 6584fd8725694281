use std::sync::Arc;

use actix_web::{post, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::{require_role, AuthenticatedUser, Role},
    errors::AppError,
    models::dto::{
        request::{AuthorizeStudentsRequest, BindQuestionsRequest},
        response::ApiResponse,
    },
};

#[post("/classes/{class_id}/subjects/{subject_id}/questions")]
async fn bind_questions(
    state: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
    request: web::Json<BindQuestionsRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &[Role::Teacher])?;

    let (class_id, subject_id) = path.into_inner();
    let set = state
        .question_bank_service
        .bind_questions(&auth.0.sub, &class_id, &subject_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::new(
        set.window,
        format!("{} questions set for {}", set.obj_questions.len(), set.subject_id),
    )))
}

#[post("/classes/{class_id}/authorizations")]
async fn authorize_students(
    state: web::Data<Arc<AppState>>,
    class_id: web::Path<String>,
    request: web::Json<AuthorizeStudentsRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &[Role::Teacher])?;

    let outcome = state
        .authorization_service
        .authorize_students(&auth.0.sub, &class_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}
