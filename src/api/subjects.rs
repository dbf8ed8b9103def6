use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::api::dto::{CreateSubjectRequest, UpdateSubjectRequest};
use crate::api::guard::{parse_id, validate, ADMIN_ROLES};
use crate::api::views::SubjectResponse;
use crate::auth::Session;
use crate::db::models::{Class, Subject};
use crate::error::AppError;
use crate::{AppState, Result};

const DUPLICATE_SUBJECT: &str = "A subject with this name already exists in this class";

async fn scoped_class(state: &AppState, session: &Session, raw_id: &str) -> Result<Class> {
    let class_id = parse_id(raw_id, "Class")?;
    state
        .store
        .find_class(session.school_id(), class_id)
        .await?
        .ok_or_else(|| AppError::not_found("Class"))
}

/// Rejects teacher ids that are unknown or belong to another school.
async fn check_teachers(state: &AppState, session: &Session, teacher_ids: &[Uuid]) -> Result<Vec<Uuid>> {
    let mut unique: Vec<Uuid> = teacher_ids.to_vec();
    unique.sort();
    unique.dedup();
    if unique.is_empty() {
        return Ok(unique);
    }

    let found = state.store.find_teachers(session.school_id(), unique.clone()).await?;
    if found.len() != unique.len() {
        return Err(AppError::invalid_field("teacherIds", "One or more teachers were not found"));
    }
    Ok(unique)
}

pub async fn list_subjects(
    session: Session,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let class = scoped_class(&state, &session, &path).await?;

    let subjects: Vec<SubjectResponse> = state
        .store
        .list_subjects(class.id)
        .await?
        .into_iter()
        .map(SubjectResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "subjects": subjects })))
}

pub async fn create_subject(
    session: Session,
    path: web::Path<String>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let input: CreateSubjectRequest = validate(&body)?;
    let class = scoped_class(&state, &session, &path).await?;

    if state.store.subject_name_exists(class.id, &input.name, None).await? {
        return Err(AppError::Conflict(DUPLICATE_SUBJECT.into()));
    }
    let teacher_ids = check_teachers(&state, &session, &input.teacher_ids).await?;

    let subject = Subject::new(class.id, input.name, input.code, input.description);
    let subject = state.store.insert_subject(&subject, teacher_ids).await?;
    info!("Subject {} ({}) created in class {}", subject.subject.id, subject.subject.name, class.id);

    Ok(HttpResponse::Created().json(json!({ "subject": SubjectResponse::from(subject) })))
}

pub async fn get_subject(
    session: Session,
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let (class_id, subject_id) = path.into_inner();
    let class_id = parse_id(&class_id, "Subject")?;
    let subject_id = parse_id(&subject_id, "Subject")?;

    let subject = state
        .store
        .find_subject(session.school_id(), class_id, subject_id)
        .await?
        .ok_or_else(|| AppError::not_found("Subject"))?;

    Ok(HttpResponse::Ok().json(json!({ "subject": SubjectResponse::from(subject) })))
}

pub async fn update_subject(
    session: Session,
    path: web::Path<(String, String)>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let input: UpdateSubjectRequest = validate(&body)?;
    let (class_id, subject_id) = path.into_inner();
    let class_id = parse_id(&class_id, "Subject")?;
    let subject_id = parse_id(&subject_id, "Subject")?;

    let current = state
        .store
        .find_subject(session.school_id(), class_id, subject_id)
        .await?
        .ok_or_else(|| AppError::not_found("Subject"))?;
    let mut subject = current.subject;

    if let Some(name) = input.name {
        if name != subject.name
            && state.store.subject_name_exists(class_id, &name, Some(subject_id)).await?
        {
            return Err(AppError::Conflict(DUPLICATE_SUBJECT.into()));
        }
        subject.name = name;
    }
    if input.code.is_some() {
        subject.code = input.code;
    }
    if input.description.is_some() {
        subject.description = input.description;
    }
    let teacher_ids = match input.teacher_ids {
        Some(ids) => Some(check_teachers(&state, &session, &ids).await?),
        None => None,
    };
    subject.updated_at = Utc::now();

    let subject = state.store.update_subject(&subject, teacher_ids).await?;
    info!("Subject {} updated", subject.subject.id);

    Ok(HttpResponse::Ok().json(json!({ "subject": SubjectResponse::from(subject) })))
}

pub async fn delete_subject(
    session: Session,
    path: web::Path<(String, String)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let (class_id, subject_id) = path.into_inner();
    let class_id = parse_id(&class_id, "Subject")?;
    let subject_id = parse_id(&subject_id, "Subject")?;

    let subject = state
        .store
        .find_subject(session.school_id(), class_id, subject_id)
        .await?
        .ok_or_else(|| AppError::not_found("Subject"))?;

    state.store.delete_subject(subject.subject.id).await?;
    info!("Subject {} deleted from class {}", subject.subject.id, class_id);

    Ok(HttpResponse::Ok().json(json!({ "message": "Subject deleted successfully" })))
}
