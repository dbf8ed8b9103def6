use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::api::dto::{
    AssignClassTeacherRequest, ClassFilterQuery, CreateSectionRequest, UpdateSectionRequest,
    DEFAULT_SECTION_CAPACITY,
};
use crate::api::guard::{parse_id, validate, validate_query, ADMIN_ROLES};
use crate::api::views::{ClassTeacherResponse, SectionResponse};
use crate::auth::Session;
use crate::db::models::Section;
use crate::db::store::SectionOverview;
use crate::error::AppError;
use crate::{AppState, Result};

const DUPLICATE_SECTION: &str = "A section with this name already exists in this class";

async fn scoped_section(state: &AppState, session: &Session, raw_id: &str) -> Result<SectionOverview> {
    let section_id = parse_id(raw_id, "Section")?;
    state
        .store
        .find_section(session.school_id(), section_id)
        .await?
        .ok_or_else(|| AppError::not_found("Section"))
}

pub async fn list_sections(
    session: Session,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let query: ClassFilterQuery = validate_query(&req)?;

    let sections: Vec<SectionResponse> = state
        .store
        .list_sections(session.school_id(), query.class_id)
        .await?
        .into_iter()
        .map(SectionResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "sections": sections })))
}

pub async fn create_section(
    session: Session,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let input: CreateSectionRequest = validate(&body)?;

    let class = state
        .store
        .find_class(session.school_id(), input.class_id)
        .await?
        .ok_or_else(|| AppError::not_found("Class"))?;

    if state.store.section_name_exists(class.id, &input.name, None).await? {
        return Err(AppError::Conflict(DUPLICATE_SECTION.into()));
    }

    let section = Section::new(
        class.id,
        input.name,
        input.capacity.unwrap_or(DEFAULT_SECTION_CAPACITY),
    );
    let section = state.store.insert_section(&section).await?;
    info!("Section {} ({}) created in class {}", section.id, section.name, class.id);

    let section = SectionResponse {
        class_name: Some(class.name),
        student_count: Some(0),
        ..SectionResponse::from(section)
    };

    Ok(HttpResponse::Created().json(json!({ "section": section })))
}

pub async fn update_section(
    session: Session,
    path: web::Path<String>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let input: UpdateSectionRequest = validate(&body)?;
    let current = scoped_section(&state, &session, &path).await?;
    let mut section = current.section;

    if let Some(name) = input.name {
        if name != section.name
            && state
                .store
                .section_name_exists(section.class_id, &name, Some(section.id))
                .await?
        {
            return Err(AppError::Conflict(DUPLICATE_SECTION.into()));
        }
        section.name = name;
    }
    if let Some(capacity) = input.capacity {
        if i64::from(capacity) < current.student_count {
            return Err(AppError::InvalidOperation(format!(
                "Capacity cannot be lower than the {} student(s) already enrolled",
                current.student_count
            )));
        }
        section.capacity = capacity;
    }
    section.updated_at = Utc::now();

    let section = state.store.update_section(&section).await?;
    info!("Section {} updated", section.id);

    let section = SectionResponse {
        class_name: Some(current.class_name),
        student_count: Some(current.student_count),
        class_teacher: current.class_teacher.map(ClassTeacherResponse::from),
        ..SectionResponse::from(section)
    };

    Ok(HttpResponse::Ok().json(json!({ "section": section })))
}

pub async fn delete_section(
    session: Session,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let current = scoped_section(&state, &session, &path).await?;

    if current.student_count > 0 {
        return Err(AppError::InvalidOperation(format!(
            "Cannot delete section with {} enrolled student(s). Reassign or remove them first.",
            current.student_count
        )));
    }

    state.store.delete_section(current.section.id).await?;
    info!("Section {} deleted by {}", current.section.id, session.user.id);

    Ok(HttpResponse::Ok().json(json!({ "message": "Section deleted successfully" })))
}

pub async fn get_class_teacher(
    session: Session,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let current = scoped_section(&state, &session, &path).await?;

    Ok(HttpResponse::Ok().json(json!({
        "classTeacher": current.class_teacher.map(ClassTeacherResponse::from)
    })))
}

pub async fn assign_class_teacher(
    session: Session,
    path: web::Path<String>,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let input: AssignClassTeacherRequest = validate(&body)?;
    let current = scoped_section(&state, &session, &path).await?;

    let teacher = state
        .store
        .find_teacher(session.school_id(), input.teacher_id)
        .await?
        .ok_or_else(|| AppError::not_found("Teacher"))?;

    let assignment = state
        .store
        .upsert_class_teacher(current.section.id, teacher.id)
        .await?;
    info!("Teacher {} assigned as class teacher of section {}", teacher.id, current.section.id);

    Ok(HttpResponse::Ok().json(json!({
        "classTeacher": ClassTeacherResponse::from(assignment)
    })))
}

pub async fn remove_class_teacher(
    session: Session,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let current = scoped_section(&state, &session, &path).await?;

    if !state.store.remove_class_teacher(current.section.id).await? {
        return Err(AppError::not_found("Class teacher assignment"));
    }
    info!("Class teacher removed from section {}", current.section.id);

    Ok(HttpResponse::Ok().json(json!({ "message": "Class teacher removed successfully" })))
}
