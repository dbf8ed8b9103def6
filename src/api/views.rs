//! Response shapes. Nested user rows are flattened and internal columns
//! (tenant ids, profile-to-user links) are left out.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::models::{Class, FeeFrequency, ParentStudent, Section};
use crate::db::store::{
    ClassOverview, ClassTeacherView, FeeStructureView, ParentStudentView, ParentView, PersonRef,
    SectionOverview, SubjectView, TeacherView,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub employee_id: Option<String>,
    pub qualification: Option<String>,
}

impl From<TeacherView> for TeacherResponse {
    fn from(t: TeacherView) -> Self {
        Self {
            id: t.id,
            user_id: t.user_id,
            name: t.name,
            email: t.email,
            employee_id: t.employee_id,
            qualification: t.qualification,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub occupation: Option<String>,
    pub children_count: i64,
}

impl From<ParentView> for ParentResponse {
    fn from(p: ParentView) -> Self {
        Self {
            id: p.id,
            user_id: p.user_id,
            name: p.name,
            email: p.email,
            phone: p.phone,
            occupation: p.occupation,
            children_count: p.children_count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<PersonRef> for PersonResponse {
    fn from(p: PersonRef) -> Self {
        Self {
            id: p.id,
            name: p.name,
            email: p.email,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassTeacherResponse {
    pub section_id: Uuid,
    pub teacher: TeacherResponse,
    pub assigned_at: DateTime<Utc>,
}

impl From<ClassTeacherView> for ClassTeacherResponse {
    fn from(ct: ClassTeacherView) -> Self {
        Self {
            section_id: ct.section_id,
            teacher: ct.teacher.into(),
            assigned_at: ct.assigned_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassResponse {
    pub id: Uuid,
    pub name: String,
    pub display_order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_count: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Class> for ClassResponse {
    fn from(c: Class) -> Self {
        Self {
            id: c.id,
            name: c.name,
            display_order: c.display_order,
            section_count: None,
            student_count: None,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

impl From<ClassOverview> for ClassResponse {
    fn from(o: ClassOverview) -> Self {
        Self {
            section_count: Some(o.section_count),
            student_count: Some(o.student_count),
            ..ClassResponse::from(o.class)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDetailResponse {
    #[serde(flatten)]
    pub class: ClassResponse,
    pub sections: Vec<SectionResponse>,
    pub subjects: Vec<SubjectResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionResponse {
    pub id: Uuid,
    pub class_id: Uuid,
    pub name: String,
    pub capacity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_count: Option<i64>,
    pub class_teacher: Option<ClassTeacherResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Section> for SectionResponse {
    fn from(s: Section) -> Self {
        Self {
            id: s.id,
            class_id: s.class_id,
            name: s.name,
            capacity: s.capacity,
            class_name: None,
            student_count: None,
            class_teacher: None,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

impl From<SectionOverview> for SectionResponse {
    fn from(o: SectionOverview) -> Self {
        Self {
            class_name: Some(o.class_name),
            student_count: Some(o.student_count),
            class_teacher: o.class_teacher.map(ClassTeacherResponse::from),
            ..SectionResponse::from(o.section)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResponse {
    pub id: Uuid,
    pub class_id: Uuid,
    pub name: String,
    pub code: Option<String>,
    pub description: Option<String>,
    pub teachers: Vec<TeacherResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubjectView> for SubjectResponse {
    fn from(v: SubjectView) -> Self {
        Self {
            id: v.subject.id,
            class_id: v.subject.class_id,
            name: v.subject.name,
            code: v.subject.code,
            description: v.subject.description,
            teachers: v.teachers.into_iter().map(TeacherResponse::from).collect(),
            created_at: v.subject.created_at,
            updated_at: v.subject.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeStructureResponse {
    pub id: Uuid,
    pub name: String,
    pub amount: f64,
    pub frequency: FeeFrequency,
    pub due_day: Option<i32>,
    pub description: Option<String>,
    pub is_active: bool,
    pub class_id: Option<Uuid>,
    pub class_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<FeeStructureView> for FeeStructureResponse {
    fn from(v: FeeStructureView) -> Self {
        Self {
            id: v.fee.id,
            name: v.fee.name,
            amount: v.fee.amount,
            frequency: v.fee.frequency,
            due_day: v.fee.due_day,
            description: v.fee.description,
            is_active: v.fee.is_active,
            class_id: v.fee.class_id,
            class_name: v.class_name,
            created_at: v.fee.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentStudentResponse {
    pub id: Uuid,
    pub relationship: Option<String>,
    pub parent: PersonResponse,
    pub student: PersonResponse,
    pub created_at: DateTime<Utc>,
}

impl From<ParentStudentView> for ParentStudentResponse {
    fn from(v: ParentStudentView) -> Self {
        let ParentStudentView { link, parent, student } = v;
        let ParentStudent { id, relationship, created_at, .. } = link;
        Self {
            id,
            relationship,
            parent: parent.into(),
            student: student.into(),
            created_at,
        }
    }
}
