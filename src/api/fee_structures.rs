use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::api::dto::{ClassFilterQuery, CreateFeeStructureRequest};
use crate::api::guard::{validate, validate_query, ADMIN_ROLES};
use crate::api::views::FeeStructureResponse;
use crate::auth::Session;
use crate::db::models::FeeStructure;
use crate::error::AppError;
use crate::{AppState, Result};

pub async fn list_fee_structures(
    session: Session,
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let query: ClassFilterQuery = validate_query(&req)?;

    let fees: Vec<FeeStructureResponse> = state
        .store
        .list_fee_structures(session.school_id(), query.class_id)
        .await?
        .into_iter()
        .map(FeeStructureResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "feeStructures": fees })))
}

pub async fn create_fee_structure(
    session: Session,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    session.authorize(ADMIN_ROLES)?;
    let input: CreateFeeStructureRequest = validate(&body)?;
    let school_id = session.school_id();

    if let Some(class_id) = input.class_id {
        state
            .store
            .find_class(school_id, class_id)
            .await?
            .ok_or_else(|| AppError::not_found("Class"))?;
    }

    let now = Utc::now();
    let fee = FeeStructure {
        id: Uuid::new_v4(),
        school_id,
        class_id: input.class_id,
        name: input.name,
        amount: input.amount,
        frequency: input.frequency,
        due_day: input.due_day,
        description: input.description,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let fee = state.store.insert_fee_structure(&fee).await?;
    info!("Fee structure {} ({}) created in school {}", fee.fee.id, fee.fee.name, school_id);

    Ok(HttpResponse::Created().json(json!({ "feeStructure": FeeStructureResponse::from(fee) })))
}
