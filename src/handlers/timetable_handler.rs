use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse};

use crate::{
    app_state::AppState,
    auth::{require_admin, require_role, AuthenticatedUser, Role},
    errors::AppError,
    models::{domain::Term, dto::request::CreateTimetableRequest},
};

const STAFF: [Role; 3] = [Role::SuperAdmin, Role::Admin, Role::Teacher];

#[post("/classes/{class_id}/timetables")]
async fn create_timetable(
    state: web::Data<Arc<AppState>>,
    class_id: web::Path<String>,
    request: web::Json<CreateTimetableRequest>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_admin(&auth.0)?;

    let timetable = state
        .timetable_service
        .create_timetable(&class_id, request.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(timetable))
}

#[get("/classes/{class_id}/timetables")]
async fn list_timetables(
    state: web::Data<Arc<AppState>>,
    class_id: web::Path<String>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &STAFF)?;

    let timetables = state.timetable_service.list_for_class(&class_id).await?;
    Ok(HttpResponse::Ok().json(timetables))
}

#[get("/classes/{class_id}/timetables/{session_id}/{term}")]
async fn get_timetable(
    state: web::Data<Arc<AppState>>,
    path: web::Path<(String, String, Term)>,
    auth: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
    require_role(&auth.0, &STAFF)?;

    let (class_id, session_id, term) = path.into_inner();
    let timetable = state
        .timetable_service
        .get_for_term(&class_id, &session_id, term)
        .await?;
    Ok(HttpResponse::Ok().json(timetable))
}
