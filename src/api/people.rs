use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::api::views::{ParentResponse, TeacherResponse};
use crate::auth::Session;
use crate::{AppState, Result};

pub async fn list_teachers(
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let teachers: Vec<TeacherResponse> = state
        .store
        .list_teachers(session.school_id())
        .await?
        .into_iter()
        .map(TeacherResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "teachers": teachers })))
}

pub async fn list_parents(
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let parents: Vec<ParentResponse> = state
        .store
        .list_parents(session.school_id())
        .await?
        .into_iter()
        .map(ParentResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "parents": parents })))
}
