use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::models::match_model::{CompleteMatchRequest, CreateMatchRequest, UpdateScoreRequest};
use crate::service::MatchService;

/// POST with an empty/absent body runs fair auto-matchmaking.
pub async fn create_match(
    service: web::Data<MatchService>,
    path: web::Path<Uuid>,
    payload: Option<web::Json<CreateMatchRequest>>,
) -> Result<HttpResponse, ApiError> {
    let request = payload.map(|p| p.into_inner());
    let created = service.create_match(path.into_inner(), request).await?;
    Ok(HttpResponse::Created().json(created))
}

pub async fn list_matches(
    service: web::Data<MatchService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let matches = service.list_matches(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(matches))
}

pub async fn get_match(
    service: web::Data<MatchService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let found = service.get_match(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(found))
}

pub async fn start_match(
    service: web::Data<MatchService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let started = service.start_match(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(started))
}

pub async fn update_score(
    service: web::Data<MatchService>,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateScoreRequest>,
) -> Result<HttpResponse, ApiError> {
    let updated = service
        .update_score(path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(updated))
}

pub async fn complete_match(
    service: web::Data<MatchService>,
    path: web::Path<Uuid>,
    payload: web::Json<CompleteMatchRequest>,
) -> Result<HttpResponse, ApiError> {
    let completed = service
        .complete_match(path.into_inner(), payload.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(completed))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/sessions/{id}/matches", web::post().to(create_match))
        .route("/sessions/{id}/matches", web::get().to(list_matches))
        .route("/matches/{id}", web::get().to(get_match))
        .route("/matches/{id}/start", web::post().to(start_match))
        .route("/matches/{id}/score", web::patch().to(update_score))
        .route("/matches/{id}/complete", web::post().to(complete_match));
}
