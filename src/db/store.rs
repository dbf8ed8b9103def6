//! Persistence seam used by every handler.
//!
//! Every finder that can see tenant data takes the caller's `school_id` and
//! applies it inside the lookup predicate, so a foreign row is simply absent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::db::models::{Class, FeeStructure, ParentStudent, Section, Subject};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStatus {
    pub total_connections: u32,
    pub idle_connections: u32,
    pub waiting_clients: u32,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TeacherView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub employee_id: Option<String>,
    pub qualification: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ParentView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub occupation: Option<String>,
    pub children_count: i64,
}

/// Minimal identity of a profile row joined with its user.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PersonRef {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct ClassOverview {
    pub class: Class,
    pub section_count: i64,
    pub student_count: i64,
}

#[derive(Debug, Clone)]
pub struct SectionOverview {
    pub section: Section,
    pub class_name: String,
    pub class_display_order: i32,
    pub student_count: i64,
    pub class_teacher: Option<ClassTeacherView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassTeacherView {
    pub section_id: Uuid,
    pub teacher: TeacherView,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SubjectView {
    pub subject: Subject,
    pub teachers: Vec<TeacherView>,
}

#[derive(Debug, Clone)]
pub struct FeeStructureView {
    pub fee: FeeStructure,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ParentStudentView {
    pub link: ParentStudent,
    pub parent: PersonRef,
    pub student: PersonRef,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParentStudentFilter {
    pub parent_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Store: Send + Sync {
    /// Round-trips a trivial statement.
    async fn ping(&self) -> Result<()>;

    fn pool_status(&self) -> PoolStatus;

    // Classes

    async fn list_classes(&self, school_id: Uuid) -> Result<Vec<ClassOverview>>;

    async fn find_class(&self, school_id: Uuid, class_id: Uuid) -> Result<Option<Class>>;

    async fn class_name_exists(&self, school_id: Uuid, name: &str, exclude: Option<Uuid>) -> Result<bool>;

    async fn insert_class(&self, class: &Class) -> Result<Class>;

    async fn update_class(&self, class: &Class) -> Result<Class>;

    /// Students enrolled directly in the class or in any of its sections.
    async fn count_class_students(&self, class_id: Uuid) -> Result<i64>;

    /// Removes the class together with its sections, subjects and class-scoped fees.
    async fn delete_class(&self, class_id: Uuid) -> Result<()>;

    // Sections

    /// Ordered by class display order, class name, then section name.
    async fn list_sections(&self, school_id: Uuid, class_id: Option<Uuid>) -> Result<Vec<SectionOverview>>;

    async fn find_section(&self, school_id: Uuid, section_id: Uuid) -> Result<Option<SectionOverview>>;

    async fn section_name_exists(&self, class_id: Uuid, name: &str, exclude: Option<Uuid>) -> Result<bool>;

    async fn insert_section(&self, section: &Section) -> Result<Section>;

    async fn update_section(&self, section: &Section) -> Result<Section>;

    async fn delete_section(&self, section_id: Uuid) -> Result<()>;

    /// Create-or-replace keyed by the section's single class-teacher slot.
    async fn upsert_class_teacher(&self, section_id: Uuid, teacher_id: Uuid) -> Result<ClassTeacherView>;

    /// Returns false when the section had no class teacher.
    async fn remove_class_teacher(&self, section_id: Uuid) -> Result<bool>;

    // Subjects

    async fn list_subjects(&self, class_id: Uuid) -> Result<Vec<SubjectView>>;

    async fn find_subject(&self, school_id: Uuid, class_id: Uuid, subject_id: Uuid) -> Result<Option<SubjectView>>;

    async fn subject_name_exists(&self, class_id: Uuid, name: &str, exclude: Option<Uuid>) -> Result<bool>;

    async fn insert_subject(&self, subject: &Subject, teacher_ids: Vec<Uuid>) -> Result<SubjectView>;

    /// `None` leaves the teacher set untouched; `Some` replaces it.
    async fn update_subject(&self, subject: &Subject, teacher_ids: Option<Vec<Uuid>>) -> Result<SubjectView>;

    async fn delete_subject(&self, subject_id: Uuid) -> Result<()>;

    // People

    async fn list_teachers(&self, school_id: Uuid) -> Result<Vec<TeacherView>>;

    async fn find_teacher(&self, school_id: Uuid, teacher_id: Uuid) -> Result<Option<TeacherView>>;

    /// Teachers among `teacher_ids` that belong to the school.
    async fn find_teachers(&self, school_id: Uuid, teacher_ids: Vec<Uuid>) -> Result<Vec<TeacherView>>;

    async fn list_parents(&self, school_id: Uuid) -> Result<Vec<ParentView>>;

    async fn find_parent(&self, school_id: Uuid, parent_id: Uuid) -> Result<Option<PersonRef>>;

    async fn find_student(&self, school_id: Uuid, student_id: Uuid) -> Result<Option<PersonRef>>;

    // Fee structures

    async fn list_fee_structures(&self, school_id: Uuid, class_id: Option<Uuid>) -> Result<Vec<FeeStructureView>>;

    async fn insert_fee_structure(&self, fee: &FeeStructure) -> Result<FeeStructureView>;

    // Parent-student links

    async fn list_parent_students(&self, school_id: Uuid, filter: ParentStudentFilter) -> Result<Vec<ParentStudentView>>;

    async fn parent_student_exists(&self, parent_id: Uuid, student_id: Uuid) -> Result<bool>;

    async fn insert_parent_student(&self, link: &ParentStudent) -> Result<ParentStudentView>;

    /// Scoped through the parent's user school.
    async fn find_parent_student(&self, school_id: Uuid, link_id: Uuid) -> Result<Option<ParentStudent>>;

    async fn delete_parent_student(&self, link_id: Uuid) -> Result<()>;
}
