//! Request payloads and their validation rules.

use serde::{Deserialize, Deserializer};
use uuid::Uuid;
use validator::Validate;

use crate::db::models::FeeFrequency;

pub const DEFAULT_SECTION_CAPACITY: i32 = 40;

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(String::deserialize(deserializer)?.trim().to_string())
}

fn trimmed_opt<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(|s| s.trim().to_string()))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "Class name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(range(min = 0, max = 1000, message = "Display order must be between 0 and 1000"))]
    pub display_order: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClassRequest {
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(min = 1, max = 100, message = "Class name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    #[validate(range(min = 0, max = 1000, message = "Display order must be between 0 and 1000"))]
    pub display_order: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSectionRequest {
    pub class_id: Uuid,
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 50, message = "Section name must be between 1 and 50 characters"))]
    pub name: String,
    #[validate(range(min = 1, max = 500, message = "Capacity must be between 1 and 500"))]
    pub capacity: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSectionRequest {
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(min = 1, max = 50, message = "Section name must be between 1 and 50 characters"))]
    pub name: Option<String>,
    #[validate(range(min = 1, max = 500, message = "Capacity must be between 1 and 500"))]
    pub capacity: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignClassTeacherRequest {
    pub teacher_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubjectRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "Subject name must be between 1 and 100 characters"))]
    pub name: String,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(max = 20, message = "Subject code must not exceed 20 characters"))]
    pub code: Option<String>,
    #[validate(length(max = 500, message = "Description must not exceed 500 characters"))]
    pub description: Option<String>,
    #[serde(default)]
    pub teacher_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubjectRequest {
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(min = 1, max = 100, message = "Subject name must be between 1 and 100 characters"))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(max = 20, message = "Subject code must not exceed 20 characters"))]
    pub code: Option<String>,
    #[validate(length(max = 500, message = "Description must not exceed 500 characters"))]
    pub description: Option<String>,
    pub teacher_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFeeStructureRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 100, message = "Fee name must be between 1 and 100 characters"))]
    pub name: String,
    #[validate(range(exclusive_min = 0.0, message = "Amount must be positive"))]
    pub amount: f64,
    pub frequency: FeeFrequency,
    pub class_id: Option<Uuid>,
    #[validate(range(min = 1, max = 28, message = "Due day must be between 1 and 28"))]
    pub due_day: Option<i32>,
    #[validate(length(max = 500, message = "Description must not exceed 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateParentStudentRequest {
    pub parent_id: Uuid,
    pub student_id: Uuid,
    #[serde(default, deserialize_with = "trimmed_opt")]
    #[validate(length(min = 1, max = 50, message = "Relationship must be between 1 and 50 characters"))]
    pub relationship: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassFilterQuery {
    pub class_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentStudentQuery {
    pub parent_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
}
