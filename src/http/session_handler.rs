use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::models::session::{CreateSessionRequest, UpdateSessionStatusRequest};
use crate::service::SessionService;

pub async fn create_session(
    service: web::Data<SessionService>,
    payload: web::Json<CreateSessionRequest>,
) -> Result<HttpResponse, ApiError> {
    let session = service.create_session(payload.into_inner()).await?;
    Ok(HttpResponse::Created().json(session))
}

pub async fn get_session(
    service: web::Data<SessionService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let session = service.get_session(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn list_sessions(
    service: web::Data<SessionService>,
) -> Result<HttpResponse, ApiError> {
    let sessions = service.list_sessions().await?;
    Ok(HttpResponse::Ok().json(sessions))
}

pub async fn update_session_status(
    service: web::Data<SessionService>,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateSessionStatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let session = service
        .update_status(path.into_inner(), payload.status)
        .await?;
    Ok(HttpResponse::Ok().json(session))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/sessions", web::post().to(create_session))
        .route("/sessions", web::get().to(list_sessions))
        .route("/sessions/{id}", web::get().to(get_session))
        .route("/sessions/{id}/status", web::patch().to(update_session_status));
}
