use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::info;

use crate::api::dto::{CreateParentStudentRequest, ParentStudentQuery};
use crate::api::guard::{parse_id, validate, validate_query, ADMIN_ROLES};
use crate::api::views::ParentStudentResponse;
use crate::auth::Session;
use crate::db::models::ParentStudent;
use crate::db::store::ParentStudentFilter;
use crate::error::AppError;
use crate::{AppState, Result};

pub async fn list_parent_students(
    session: Session,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let query: ParentStudentQuery = validate_query(&req)?;
    let filter = ParentStudentFilter {
        parent_id: query.parent_id,
        student_id: query.student_id,
    };

    let links: Vec<ParentStudentResponse> = state
        .store
        .list_parent_students(session.school_id(), filter)
        .await?
        .into_iter()
        .map(ParentStudentResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "parentStudents": links })))
}

pub async fn create_parent_student(
    session: Session,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let input: CreateParentStudentRequest = validate(&body)?;
    let school_id = session.school_id();

    let parent = state
        .store
        .find_parent(school_id, input.parent_id)
        .await?
        .ok_or_else(|| AppError::not_found("Parent"))?;
    let student = state
        .store
        .find_student(school_id, input.student_id)
        .await?
        .ok_or_else(|| AppError::not_found("Student"))?;

    if state.store.parent_student_exists(parent.id, student.id).await? {
        return Err(AppError::Conflict(
            "This parent-student relationship already exists".into(),
        ));
    }

    let link = ParentStudent::new(parent.id, student.id, input.relationship);
    let link = state.store.insert_parent_student(&link).await?;
    info!("Parent {} linked to student {}", parent.id, student.id);

    Ok(HttpResponse::Created().json(json!({ "parentStudent": ParentStudentResponse::from(link) })))
}

pub async fn delete_parent_student(
    session: Session,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let link_id = parse_id(&path, "Parent-student relationship")?;

    let link = state
        .store
        .find_parent_student(session.school_id(), link_id)
        .await?
        .ok_or_else(|| AppError::not_found("Parent-student relationship"))?;

    state.store.delete_parent_student(link.id).await?;
    info!("Parent-student link {} removed", link.id);

    Ok(HttpResponse::Ok().json(json!({ "message": "Parent-student relationship removed successfully" })))
}
