use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::models::{
    Class, FeeStructure, ParentProfile, ParentStudent, Role, School, Section, StudentProfile,
    Subject, TeacherProfile, User,
};
use crate::db::store::{
    ClassOverview, ClassTeacherView, FeeStructureView, ParentStudentFilter, ParentStudentView,
    ParentView, PersonRef, PoolStatus, SectionOverview, Store, SubjectView, TeacherView,
};
use crate::error::{AppError, DatabaseError};
use crate::Result;

#[derive(Default)]
struct Tables {
    schools: HashMap<Uuid, School>,
    users: HashMap<Uuid, User>,
    teachers: HashMap<Uuid, TeacherProfile>,
    parents: HashMap<Uuid, ParentProfile>,
    students: HashMap<Uuid, StudentProfile>,
    classes: HashMap<Uuid, Class>,
    sections: HashMap<Uuid, Section>,
    // keyed by section id: one class teacher per section
    class_teachers: HashMap<Uuid, (Uuid, DateTime<Utc>)>,
    subjects: HashMap<Uuid, Subject>,
    subject_teachers: HashMap<Uuid, Vec<Uuid>>,
    fee_structures: HashMap<Uuid, FeeStructure>,
    parent_students: HashMap<Uuid, ParentStudent>,
}

fn duplicate() -> AppError {
    AppError::DatabaseError(DatabaseError::Duplicate)
}

fn still_referenced() -> AppError {
    AppError::DatabaseError(DatabaseError::StillReferenced)
}

fn missing() -> AppError {
    AppError::DatabaseError(DatabaseError::NotFound)
}

impl Tables {
    fn user_school(&self, user_id: Uuid) -> Option<Uuid> {
        self.users.get(&user_id).map(|u| u.school_id)
    }

    fn teacher_view(&self, teacher_id: Uuid) -> Option<TeacherView> {
        let profile = self.teachers.get(&teacher_id)?;
        let user = self.users.get(&profile.user_id)?;
        Some(TeacherView {
            id: profile.id,
            user_id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            employee_id: profile.employee_id.clone(),
            qualification: profile.qualification.clone(),
        })
    }

    fn person(&self, id: Uuid, user_id: Uuid) -> Option<PersonRef> {
        let user = self.users.get(&user_id)?;
        Some(PersonRef {
            id,
            user_id,
            name: user.name.clone(),
            email: user.email.clone(),
        })
    }

    fn parent_ref(&self, parent_id: Uuid) -> Option<PersonRef> {
        let profile = self.parents.get(&parent_id)?;
        self.person(profile.id, profile.user_id)
    }

    fn student_ref(&self, student_id: Uuid) -> Option<PersonRef> {
        let profile = self.students.get(&student_id)?;
        self.person(profile.id, profile.user_id)
    }

    fn class_in_school(&self, school_id: Uuid, class_id: Uuid) -> Option<&Class> {
        self.classes.get(&class_id).filter(|c| c.school_id == school_id)
    }

    fn section_students(&self, section_id: Uuid) -> i64 {
        self.students
            .values()
            .filter(|s| s.section_id == Some(section_id))
            .count() as i64
    }

    fn class_students(&self, class_id: Uuid) -> i64 {
        self.students
            .values()
            .filter(|s| {
                s.class_id == Some(class_id)
                    || s
                        .section_id
                        .and_then(|id| self.sections.get(&id))
                        .map_or(false, |section| section.class_id == class_id)
            })
            .count() as i64
    }

    fn class_teacher(&self, section_id: Uuid) -> Option<ClassTeacherView> {
        let (teacher_id, assigned_at) = self.class_teachers.get(&section_id)?;
        Some(ClassTeacherView {
            section_id,
            teacher: self.teacher_view(*teacher_id)?,
            assigned_at: *assigned_at,
        })
    }

    fn section_overview(&self, section: &Section) -> Option<SectionOverview> {
        let class = self.classes.get(&section.class_id)?;
        Some(SectionOverview {
            section: section.clone(),
            class_name: class.name.clone(),
            class_display_order: class.display_order,
            student_count: self.section_students(section.id),
            class_teacher: self.class_teacher(section.id),
        })
    }

    fn subject_view(&self, subject: &Subject) -> SubjectView {
        let mut teachers: Vec<TeacherView> = self
            .subject_teachers
            .get(&subject.id)
            .map(|ids| ids.iter().filter_map(|id| self.teacher_view(*id)).collect())
            .unwrap_or_default();
        teachers.sort_by(|a, b| a.name.cmp(&b.name));
        SubjectView {
            subject: subject.clone(),
            teachers,
        }
    }

    fn fee_view(&self, fee: &FeeStructure) -> FeeStructureView {
        FeeStructureView {
            fee: fee.clone(),
            class_name: fee
                .class_id
                .and_then(|id| self.classes.get(&id))
                .map(|c| c.name.clone()),
        }
    }

    fn parent_student_view(&self, link: &ParentStudent) -> Option<ParentStudentView> {
        Some(ParentStudentView {
            link: link.clone(),
            parent: self.parent_ref(link.parent_id)?,
            student: self.student_ref(link.student_id)?,
        })
    }

    fn parent_student_school(&self, link: &ParentStudent) -> Option<Uuid> {
        let parent = self.parents.get(&link.parent_id)?;
        self.user_school(parent.user_id)
    }

    fn remove_section(&mut self, section_id: Uuid) {
        self.sections.remove(&section_id);
        self.class_teachers.remove(&section_id);
    }

    fn remove_subject(&mut self, subject_id: Uuid) {
        self.subjects.remove(&subject_id);
        self.subject_teachers.remove(&subject_id);
    }
}

/// In-process store with the same constraints as the relational schema.
///
/// Every operation takes the single table lock, so each call is atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_school(&self, name: &str) -> School {
        let school = School {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.tables.write().await.schools.insert(school.id, school.clone());
        school
    }

    pub async fn add_user(&self, school_id: Uuid, email: &str, name: &str, role: Role) -> Result<User> {
        let mut tables = self.tables.write().await;
        if !tables.schools.contains_key(&school_id) {
            return Err(missing());
        }
        if tables.users.values().any(|u| u.email == email) {
            return Err(duplicate());
        }
        let user = User::new(school_id, email.to_string(), name.to_string(), role);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    pub async fn add_teacher(&self, school_id: Uuid, email: &str, name: &str) -> Result<TeacherProfile> {
        let user = self.add_user(school_id, email, name, Role::Teacher).await?;
        let profile = TeacherProfile {
            id: Uuid::new_v4(),
            user_id: user.id,
            employee_id: None,
            qualification: None,
        };
        self.tables.write().await.teachers.insert(profile.id, profile.clone());
        Ok(profile)
    }

    pub async fn add_parent(&self, school_id: Uuid, email: &str, name: &str) -> Result<ParentProfile> {
        let user = self.add_user(school_id, email, name, Role::Parent).await?;
        let profile = ParentProfile {
            id: Uuid::new_v4(),
            user_id: user.id,
            phone: None,
            occupation: None,
        };
        self.tables.write().await.parents.insert(profile.id, profile.clone());
        Ok(profile)
    }

    /// Enrolls a student; `section_id` implies the section's class.
    pub async fn add_student(
        &self,
        school_id: Uuid,
        email: &str,
        name: &str,
        section_id: Option<Uuid>,
    ) -> Result<StudentProfile> {
        let user = self.add_user(school_id, email, name, Role::Student).await?;
        let mut tables = self.tables.write().await;
        let class_id = match section_id {
            Some(id) => Some(tables.sections.get(&id).ok_or_else(missing)?.class_id),
            None => None,
        };
        let profile = StudentProfile {
            id: Uuid::new_v4(),
            user_id: user.id,
            class_id,
            section_id,
            admission_number: None,
        };
        tables.students.insert(profile.id, profile.clone());
        Ok(profile)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        let _tables = self.tables.read().await;
        Ok(())
    }

    fn pool_status(&self) -> PoolStatus {
        PoolStatus {
            total_connections: 1,
            idle_connections: 1,
            waiting_clients: 0,
        }
    }

    async fn list_classes(&self, school_id: Uuid) -> Result<Vec<ClassOverview>> {
        let tables = self.tables.read().await;
        let mut classes: Vec<ClassOverview> = tables
            .classes
            .values()
            .filter(|c| c.school_id == school_id)
            .map(|c| ClassOverview {
                class: c.clone(),
                section_count: tables.sections.values().filter(|s| s.class_id == c.id).count() as i64,
                student_count: tables.class_students(c.id),
            })
            .collect();
        classes.sort_by(|a, b| {
            (a.class.display_order, &a.class.name).cmp(&(b.class.display_order, &b.class.name))
        });
        Ok(classes)
    }

    async fn find_class(&self, school_id: Uuid, class_id: Uuid) -> Result<Option<Class>> {
        let tables = self.tables.read().await;
        Ok(tables.class_in_school(school_id, class_id).cloned())
    }

    async fn class_name_exists(&self, school_id: Uuid, name: &str, exclude: Option<Uuid>) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .classes
            .values()
            .any(|c| c.school_id == school_id && c.name == name && Some(c.id) != exclude))
    }

    async fn insert_class(&self, class: &Class) -> Result<Class> {
        let mut tables = self.tables.write().await;
        if tables
            .classes
            .values()
            .any(|c| c.school_id == class.school_id && c.name == class.name)
        {
            return Err(duplicate());
        }
        tables.classes.insert(class.id, class.clone());
        Ok(class.clone())
    }

    async fn update_class(&self, class: &Class) -> Result<Class> {
        let mut tables = self.tables.write().await;
        if tables
            .classes
            .values()
            .any(|c| c.school_id == class.school_id && c.name == class.name && c.id != class.id)
        {
            return Err(duplicate());
        }
        let stored = tables.classes.get_mut(&class.id).ok_or_else(missing)?;
        stored.name = class.name.clone();
        stored.display_order = class.display_order;
        stored.updated_at = class.updated_at;
        Ok(stored.clone())
    }

    async fn count_class_students(&self, class_id: Uuid) -> Result<i64> {
        Ok(self.tables.read().await.class_students(class_id))
    }

    async fn delete_class(&self, class_id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.class_students(class_id) > 0 {
            return Err(still_referenced());
        }
        let section_ids: Vec<Uuid> = tables
            .sections
            .values()
            .filter(|s| s.class_id == class_id)
            .map(|s| s.id)
            .collect();
        for id in section_ids {
            tables.remove_section(id);
        }
        let subject_ids: Vec<Uuid> = tables
            .subjects
            .values()
            .filter(|s| s.class_id == class_id)
            .map(|s| s.id)
            .collect();
        for id in subject_ids {
            tables.remove_subject(id);
        }
        tables.fee_structures.retain(|_, f| f.class_id != Some(class_id));
        tables.classes.remove(&class_id);
        Ok(())
    }

    async fn list_sections(&self, school_id: Uuid, class_id: Option<Uuid>) -> Result<Vec<SectionOverview>> {
        let tables = self.tables.read().await;
        let mut sections: Vec<SectionOverview> = tables
            .sections
            .values()
            .filter(|s| class_id.map_or(true, |id| s.class_id == id))
            .filter(|s| tables.class_in_school(school_id, s.class_id).is_some())
            .filter_map(|s| tables.section_overview(s))
            .collect();
        sections.sort_by(|a, b| {
            (a.class_display_order, &a.class_name, &a.section.name)
                .cmp(&(b.class_display_order, &b.class_name, &b.section.name))
        });
        Ok(sections)
    }

    async fn find_section(&self, school_id: Uuid, section_id: Uuid) -> Result<Option<SectionOverview>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sections
            .get(&section_id)
            .filter(|s| tables.class_in_school(school_id, s.class_id).is_some())
            .and_then(|s| tables.section_overview(s)))
    }

    async fn section_name_exists(&self, class_id: Uuid, name: &str, exclude: Option<Uuid>) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .sections
            .values()
            .any(|s| s.class_id == class_id && s.name == name && Some(s.id) != exclude))
    }

    async fn insert_section(&self, section: &Section) -> Result<Section> {
        let mut tables = self.tables.write().await;
        if !tables.classes.contains_key(&section.class_id) {
            return Err(missing());
        }
        if tables
            .sections
            .values()
            .any(|s| s.class_id == section.class_id && s.name == section.name)
        {
            return Err(duplicate());
        }
        tables.sections.insert(section.id, section.clone());
        Ok(section.clone())
    }

    async fn update_section(&self, section: &Section) -> Result<Section> {
        let mut tables = self.tables.write().await;
        if tables
            .sections
            .values()
            .any(|s| s.class_id == section.class_id && s.name == section.name && s.id != section.id)
        {
            return Err(duplicate());
        }
        let stored = tables.sections.get_mut(&section.id).ok_or_else(missing)?;
        stored.name = section.name.clone();
        stored.capacity = section.capacity;
        stored.updated_at = section.updated_at;
        Ok(stored.clone())
    }

    async fn delete_section(&self, section_id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.section_students(section_id) > 0 {
            return Err(still_referenced());
        }
        tables.remove_section(section_id);
        Ok(())
    }

    async fn upsert_class_teacher(&self, section_id: Uuid, teacher_id: Uuid) -> Result<ClassTeacherView> {
        let mut tables = self.tables.write().await;
        if !tables.sections.contains_key(&section_id) {
            return Err(missing());
        }
        let teacher = tables.teacher_view(teacher_id).ok_or_else(missing)?;
        let assigned_at = Utc::now();
        tables.class_teachers.insert(section_id, (teacher_id, assigned_at));
        Ok(ClassTeacherView {
            section_id,
            teacher,
            assigned_at,
        })
    }

    async fn remove_class_teacher(&self, section_id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.class_teachers.remove(&section_id).is_some())
    }

    async fn list_subjects(&self, class_id: Uuid) -> Result<Vec<SubjectView>> {
        let tables = self.tables.read().await;
        let mut subjects: Vec<SubjectView> = tables
            .subjects
            .values()
            .filter(|s| s.class_id == class_id)
            .map(|s| tables.subject_view(s))
            .collect();
        subjects.sort_by(|a, b| a.subject.name.cmp(&b.subject.name));
        Ok(subjects)
    }

    async fn find_subject(&self, school_id: Uuid, class_id: Uuid, subject_id: Uuid) -> Result<Option<SubjectView>> {
        let tables = self.tables.read().await;
        Ok(tables
            .subjects
            .get(&subject_id)
            .filter(|s| s.class_id == class_id)
            .filter(|s| tables.class_in_school(school_id, s.class_id).is_some())
            .map(|s| tables.subject_view(s)))
    }

    async fn subject_name_exists(&self, class_id: Uuid, name: &str, exclude: Option<Uuid>) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .subjects
            .values()
            .any(|s| s.class_id == class_id && s.name == name && Some(s.id) != exclude))
    }

    async fn insert_subject(&self, subject: &Subject, teacher_ids: Vec<Uuid>) -> Result<SubjectView> {
        let mut tables = self.tables.write().await;
        if tables
            .subjects
            .values()
            .any(|s| s.class_id == subject.class_id && s.name == subject.name)
        {
            return Err(duplicate());
        }
        if teacher_ids.iter().any(|id| !tables.teachers.contains_key(id)) {
            return Err(missing());
        }
        tables.subjects.insert(subject.id, subject.clone());
        tables.subject_teachers.insert(subject.id, teacher_ids);
        Ok(tables.subject_view(subject))
    }

    async fn update_subject(&self, subject: &Subject, teacher_ids: Option<Vec<Uuid>>) -> Result<SubjectView> {
        let mut tables = self.tables.write().await;
        if tables
            .subjects
            .values()
            .any(|s| s.class_id == subject.class_id && s.name == subject.name && s.id != subject.id)
        {
            return Err(duplicate());
        }
        if let Some(ids) = &teacher_ids {
            if ids.iter().any(|id| !tables.teachers.contains_key(id)) {
                return Err(missing());
            }
        }
        let stored = tables.subjects.get_mut(&subject.id).ok_or_else(missing)?;
        stored.name = subject.name.clone();
        stored.code = subject.code.clone();
        stored.description = subject.description.clone();
        stored.updated_at = subject.updated_at;
        let stored = stored.clone();
        if let Some(ids) = teacher_ids {
            tables.subject_teachers.insert(subject.id, ids);
        }
        Ok(tables.subject_view(&stored))
    }

    async fn delete_subject(&self, subject_id: Uuid) -> Result<()> {
        self.tables.write().await.remove_subject(subject_id);
        Ok(())
    }

    async fn list_teachers(&self, school_id: Uuid) -> Result<Vec<TeacherView>> {
        let tables = self.tables.read().await;
        let mut teachers: Vec<TeacherView> = tables
            .teachers
            .values()
            .filter(|t| tables.user_school(t.user_id) == Some(school_id))
            .filter_map(|t| tables.teacher_view(t.id))
            .collect();
        teachers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teachers)
    }

    async fn find_teacher(&self, school_id: Uuid, teacher_id: Uuid) -> Result<Option<TeacherView>> {
        let tables = self.tables.read().await;
        Ok(tables
            .teachers
            .get(&teacher_id)
            .filter(|t| tables.user_school(t.user_id) == Some(school_id))
            .and_then(|t| tables.teacher_view(t.id)))
    }

    async fn find_teachers(&self, school_id: Uuid, teacher_ids: Vec<Uuid>) -> Result<Vec<TeacherView>> {
        let mut found = Vec::new();
        for id in teacher_ids {
            if let Some(teacher) = self.find_teacher(school_id, id).await? {
                if !found.iter().any(|t: &TeacherView| t.id == teacher.id) {
                    found.push(teacher);
                }
            }
        }
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn list_parents(&self, school_id: Uuid) -> Result<Vec<ParentView>> {
        let tables = self.tables.read().await;
        let mut parents: Vec<ParentView> = tables
            .parents
            .values()
            .filter_map(|p| {
                let user = tables.users.get(&p.user_id).filter(|u| u.school_id == school_id)?;
                Some(ParentView {
                    id: p.id,
                    user_id: user.id,
                    name: user.name.clone(),
                    email: user.email.clone(),
                    phone: p.phone.clone(),
                    occupation: p.occupation.clone(),
                    children_count: tables
                        .parent_students
                        .values()
                        .filter(|l| l.parent_id == p.id)
                        .count() as i64,
                })
            })
            .collect();
        parents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(parents)
    }

    async fn find_parent(&self, school_id: Uuid, parent_id: Uuid) -> Result<Option<PersonRef>> {
        let tables = self.tables.read().await;
        Ok(tables
            .parent_ref(parent_id)
            .filter(|p| tables.user_school(p.user_id) == Some(school_id)))
    }

    async fn find_student(&self, school_id: Uuid, student_id: Uuid) -> Result<Option<PersonRef>> {
        let tables = self.tables.read().await;
        Ok(tables
            .student_ref(student_id)
            .filter(|s| tables.user_school(s.user_id) == Some(school_id)))
    }

    async fn list_fee_structures(&self, school_id: Uuid, class_id: Option<Uuid>) -> Result<Vec<FeeStructureView>> {
        let tables = self.tables.read().await;
        let mut fees: Vec<FeeStructureView> = tables
            .fee_structures
            .values()
            .filter(|f| f.school_id == school_id)
            .filter(|f| class_id.map_or(true, |id| f.class_id == Some(id)))
            .map(|f| tables.fee_view(f))
            .collect();
        fees.sort_by(|a, b| b.fee.created_at.cmp(&a.fee.created_at));
        Ok(fees)
    }

    async fn insert_fee_structure(&self, fee: &FeeStructure) -> Result<FeeStructureView> {
        let mut tables = self.tables.write().await;
        tables.fee_structures.insert(fee.id, fee.clone());
        Ok(tables.fee_view(fee))
    }

    async fn list_parent_students(&self, school_id: Uuid, filter: ParentStudentFilter) -> Result<Vec<ParentStudentView>> {
        let tables = self.tables.read().await;
        let mut links: Vec<ParentStudentView> = tables
            .parent_students
            .values()
            .filter(|l| tables.parent_student_school(l) == Some(school_id))
            .filter(|l| filter.parent_id.map_or(true, |id| l.parent_id == id))
            .filter(|l| filter.student_id.map_or(true, |id| l.student_id == id))
            .filter_map(|l| tables.parent_student_view(l))
            .collect();
        links.sort_by(|a, b| a.link.created_at.cmp(&b.link.created_at));
        Ok(links)
    }

    async fn parent_student_exists(&self, parent_id: Uuid, student_id: Uuid) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .parent_students
            .values()
            .any(|l| l.parent_id == parent_id && l.student_id == student_id))
    }

    async fn insert_parent_student(&self, link: &ParentStudent) -> Result<ParentStudentView> {
        let mut tables = self.tables.write().await;
        if tables
            .parent_students
            .values()
            .any(|l| l.parent_id == link.parent_id && l.student_id == link.student_id)
        {
            return Err(duplicate());
        }
        let view = tables.parent_student_view(link).ok_or_else(missing)?;
        tables.parent_students.insert(link.id, link.clone());
        Ok(view)
    }

    async fn find_parent_student(&self, school_id: Uuid, link_id: Uuid) -> Result<Option<ParentStudent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .parent_students
            .get(&link_id)
            .filter(|l| tables.parent_student_school(l) == Some(school_id))
            .cloned())
    }

    async fn delete_parent_student(&self, link_id: Uuid) -> Result<()> {
        self.tables.write().await.parent_students.remove(&link_id);
        Ok(())
    }
}
