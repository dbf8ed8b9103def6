use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::api::dto::{CreateClassRequest, UpdateClassRequest};
use crate::api::guard::{parse_id, validate, ADMIN_ROLES};
use crate::api::views::{ClassDetailResponse, ClassResponse, SectionResponse, SubjectResponse};
use crate::auth::Session;
use crate::db::models::Class;
use crate::error::AppError;
use crate::{AppState, Result};

pub async fn list_classes(
    session: Session,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let classes: Vec<ClassResponse> = state
        .store
        .list_classes(session.school_id())
        .await?
        .into_iter()
        .map(ClassResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "classes": classes })))
}

pub async fn create_class(
    session: Session,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let input: CreateClassRequest = validate(&body)?;
    let school_id = session.school_id();

    if state.store.class_name_exists(school_id, &input.name, None).await? {
        return Err(AppError::Conflict("A class with this name already exists".into()));
    }

    let class = Class::new(school_id, input.name, input.display_order.unwrap_or(0));
    let class = state.store.insert_class(&class).await?;
    info!("Class {} ({}) created in school {}", class.id, class.name, school_id);

    Ok(HttpResponse::Created().json(json!({ "class": ClassResponse::from(class) })))
}

pub async fn get_class(
    session: Session,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let class_id = parse_id(&path, "Class")?;
    let school_id = session.school_id();

    let class = state
        .store
        .find_class(school_id, class_id)
        .await?
        .ok_or_else(|| AppError::not_found("Class"))?;

    let sections = state.store.list_sections(school_id, Some(class_id)).await?;
    let subjects = state.store.list_subjects(class_id).await?;
    let student_count = state.store.count_class_students(class_id).await?;

    let detail = ClassDetailResponse {
        class: ClassResponse {
            section_count: Some(sections.len() as i64),
            student_count: Some(student_count),
            ..ClassResponse::from(class)
        },
        sections: sections.into_iter().map(SectionResponse::from).collect(),
        subjects: subjects.into_iter().map(SubjectResponse::from).collect(),
    };

    Ok(HttpResponse::Ok().json(json!({ "class": detail })))
}

pub async fn update_class(
    session: Session,
    path: web::Path<String>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let input: UpdateClassRequest = validate(&body)?;
    let class_id = parse_id(&path, "Class")?;
    let school_id = session.school_id();

    let mut class = state
        .store
        .find_class(school_id, class_id)
        .await?
        .ok_or_else(|| AppError::not_found("Class"))?;

    if let Some(name) = input.name {
        if name != class.name
            && state.store.class_name_exists(school_id, &name, Some(class_id)).await?
        {
            return Err(AppError::Conflict("A class with this name already exists".into()));
        }
        class.name = name;
    }
    if let Some(display_order) = input.display_order {
        class.display_order = display_order;
    }
    class.updated_at = Utc::now();

    let class = state.store.update_class(&class).await?;
    info!("Class {} updated", class.id);

    Ok(HttpResponse::Ok().json(json!({ "class": ClassResponse::from(class) })))
}

pub async fn delete_class(
    session: Session,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let class_id = parse_id(&path, "Class")?;

    let class = state
        .store
        .find_class(session.school_id(), class_id)
        .await?
        .ok_or_else(|| AppError::not_found("Class"))?;

    let enrolled = state.store.count_class_students(class.id).await?;
    if enrolled > 0 {
        return Err(AppError::InvalidOperation(format!(
            "Cannot delete class with {} enrolled student(s). Reassign or remove them first.",
            enrolled
        )));
    }

    state.store.delete_class(class.id).await?;
    info!("Class {} ({}) deleted by {}", class.id, class.name, session.user.id);

    Ok(HttpResponse::Ok().json(json!({ "message": "Class deleted successfully" })))
}
