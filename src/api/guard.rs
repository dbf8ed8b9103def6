//! Request pipeline steps shared by every handler.
//!
//! Handlers compose them in a fixed order: the `Session` extractor
//! authenticates, [`Session::authorize`] checks the role allow-list,
//! [`validate`] / [`validate_query`] check input shape, and [`parse_id`]
//! turns path segments into ids. Scoping happens in the store lookups.

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use serde::de::DeserializeOwned;
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

use crate::auth::Session;
use crate::db::models::Role;
use crate::error::{AppError, FieldIssue};
use crate::{AppState, Result};

/// Roles allowed to mutate school configuration.
pub const ADMIN_ROLES: &[Role] = &[Role::SuperAdmin, Role::Admin];

impl FromRequest for Session {
    type Error = AppError;
    type Future = Ready<std::result::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let session = req
            .app_data::<web::Data<AppState>>()
            .and_then(|state| state.sessions.resolve_session(req));

        match session {
            Some(session) => ready(Ok(session)),
            None => {
                warn!("Unauthenticated {} {}", req.method(), req.path());
                ready(Err(AppError::Unauthorized))
            }
        }
    }
}

impl Session {
    pub fn authorize(&self, allowed: &[Role]) -> Result<()> {
        if allowed.contains(&self.user.role) {
            Ok(())
        } else {
            warn!("User {} with role {} denied", self.user.id, self.user.role);
            Err(AppError::Forbidden)
        }
    }
}

/// Parses a JSON body and runs its declared rules.
pub fn validate<T>(body: &[u8]) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::invalid_field("body", "Request body is required"));
    }

    let input: T = serde_json::from_slice(body)
        .map_err(|e| AppError::ValidationError(vec![FieldIssue::new("body", e.to_string())]))?;
    input.validate()?;
    Ok(input)
}

pub fn validate_query<T>(req: &HttpRequest) -> Result<T>
where
    T: DeserializeOwned,
{
    web::Query::<T>::from_query(req.query_string())
        .map(web::Query::into_inner)
        .map_err(|e| AppError::ValidationError(vec![FieldIssue::new("query", e.to_string())]))
}

/// Malformed ids are indistinguishable from unknown ones.
pub fn parse_id(raw: &str, entity: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found(entity))
}
