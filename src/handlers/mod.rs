pub mod attempt_handler;
pub mod exam_handler;
pub mod graphql_handler;
pub mod health_handler;
pub mod question_handler;
pub mod timetable_handler;

use actix_web::web;

use crate::auth::AuthMiddleware;

pub use health_handler::{health_check, health_check_ready};

/// Registers every route. Everything under `/api/cbt` requires a bearer token.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_handler::health_check)
        .service(health_handler::health_check_ready)
        .service(graphql_handler::graphql)
        .service(graphql_handler::graphiql)
        .service(
            web::scope("/api/cbt")
                .wrap(AuthMiddleware)
                .service(exam_handler::create_exam)
                .service(exam_handler::list_exams)
                .service(exam_handler::get_exam)
                .service(exam_handler::get_exam_for_term)
                .service(exam_handler::update_exam)
                .service(exam_handler::deactivate_exam)
                .service(timetable_handler::create_timetable)
                .service(timetable_handler::list_timetables)
                .service(timetable_handler::get_timetable)
                .service(question_handler::bind_questions)
                .service(question_handler::authorize_students)
                .service(attempt_handler::start_exam)
                .service(attempt_handler::update_answers)
                .service(attempt_handler::update_time)
                .service(attempt_handler::submit_exam)
                .service(attempt_handler::force_end_exam)
                .service(attempt_handler::get_attempt)
                .service(attempt_handler::channel),
        );
}
