use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::db::models::{Class, FeeStructure, ParentStudent, Section, Subject};
use crate::db::store::{
    ClassOverview, ClassTeacherView, FeeStructureView, ParentStudentFilter, ParentStudentView,
    ParentView, PersonRef, PoolStatus, SectionOverview, Store, SubjectView, TeacherView,
};
use crate::Result;

const TEACHER_SELECT: &str = r#"
    SELECT tp.id, tp.user_id, u.name, u.email, tp.employee_id, tp.qualification
    FROM teacher_profiles tp
    JOIN users u ON u.id = tp.user_id
"#;

const SECTION_SELECT: &str = r#"
    SELECT s.id, s.class_id, s.name, s.capacity, s.created_at, s.updated_at,
           c.name AS class_name,
           c.display_order AS class_display_order,
           (SELECT COUNT(*) FROM student_profiles sp WHERE sp.section_id = s.id) AS student_count,
           ct.assigned_at AS ct_assigned_at,
           tp.id AS ct_teacher_id,
           tp.user_id AS ct_user_id,
           u.name AS ct_name,
           u.email AS ct_email,
           tp.employee_id AS ct_employee_id,
           tp.qualification AS ct_qualification
    FROM sections s
    JOIN classes c ON c.id = s.class_id
    LEFT JOIN section_class_teachers ct ON ct.section_id = s.id
    LEFT JOIN teacher_profiles tp ON tp.id = ct.teacher_id
    LEFT JOIN users u ON u.id = tp.user_id
"#;

const FEE_SELECT: &str = r#"
    SELECT f.id, f.school_id, f.class_id, f.name, f.amount, f.frequency, f.due_day,
           f.description, f.is_active, f.created_at, f.updated_at,
           c.name AS class_name
    FROM fee_structures f
    LEFT JOIN classes c ON c.id = f.class_id
"#;

const PARENT_STUDENT_SELECT: &str = r#"
    SELECT ps.id, ps.parent_id, ps.student_id, ps.relationship, ps.created_at,
           pp.user_id AS parent_user_id, pu.name AS parent_name, pu.email AS parent_email,
           sp.user_id AS student_user_id, su.name AS student_name, su.email AS student_email
    FROM parent_students ps
    JOIN parent_profiles pp ON pp.id = ps.parent_id
    JOIN users pu ON pu.id = pp.user_id
    JOIN student_profiles sp ON sp.id = ps.student_id
    JOIN users su ON su.id = sp.user_id
"#;

#[derive(FromRow)]
struct ClassRow {
    #[sqlx(flatten)]
    class: Class,
    section_count: i64,
    student_count: i64,
}

#[derive(FromRow)]
struct SectionRow {
    #[sqlx(flatten)]
    section: Section,
    class_name: String,
    class_display_order: i32,
    student_count: i64,
    ct_assigned_at: Option<DateTime<Utc>>,
    ct_teacher_id: Option<Uuid>,
    ct_user_id: Option<Uuid>,
    ct_name: Option<String>,
    ct_email: Option<String>,
    ct_employee_id: Option<String>,
    ct_qualification: Option<String>,
}

impl From<SectionRow> for SectionOverview {
    fn from(row: SectionRow) -> Self {
        let class_teacher = match (row.ct_assigned_at, row.ct_teacher_id, row.ct_user_id) {
            (Some(assigned_at), Some(id), Some(user_id)) => Some(ClassTeacherView {
                section_id: row.section.id,
                teacher: TeacherView {
                    id,
                    user_id,
                    name: row.ct_name.unwrap_or_default(),
                    email: row.ct_email.unwrap_or_default(),
                    employee_id: row.ct_employee_id,
                    qualification: row.ct_qualification,
                },
                assigned_at,
            }),
            _ => None,
        };

        SectionOverview {
            section: row.section,
            class_name: row.class_name,
            class_display_order: row.class_display_order,
            student_count: row.student_count,
            class_teacher,
        }
    }
}

#[derive(FromRow)]
struct ClassTeacherRow {
    section_id: Uuid,
    assigned_at: DateTime<Utc>,
    #[sqlx(flatten)]
    teacher: TeacherView,
}

#[derive(FromRow)]
struct SubjectTeacherRow {
    subject_id: Uuid,
    #[sqlx(flatten)]
    teacher: TeacherView,
}

#[derive(FromRow)]
struct FeeRow {
    #[sqlx(flatten)]
    fee: FeeStructure,
    class_name: Option<String>,
}

impl From<FeeRow> for FeeStructureView {
    fn from(row: FeeRow) -> Self {
        FeeStructureView {
            fee: row.fee,
            class_name: row.class_name,
        }
    }
}

#[derive(FromRow)]
struct ParentStudentRow {
    #[sqlx(flatten)]
    link: ParentStudent,
    parent_user_id: Uuid,
    parent_name: String,
    parent_email: String,
    student_user_id: Uuid,
    student_name: String,
    student_email: String,
}

impl From<ParentStudentRow> for ParentStudentView {
    fn from(row: ParentStudentRow) -> Self {
        ParentStudentView {
            parent: PersonRef {
                id: row.link.parent_id,
                user_id: row.parent_user_id,
                name: row.parent_name,
                email: row.parent_email,
            },
            student: PersonRef {
                id: row.link.student_id,
                user_id: row.student_user_id,
                name: row.student_name,
                email: row.student_email,
            },
            link: row.link,
        }
    }
}

/// PostgreSQL-backed store.
pub struct PgStore {
    pool: Arc<PgPool>,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.url)
            .await?;

        info!("Connected to database (max {} connections)", config.max_connections);
        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>> {
        Ok(self.pool.as_ref().begin().await?)
    }

    async fn teachers_for_subjects(&self, subject_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<TeacherView>>> {
        let rows = sqlx::query_as::<_, SubjectTeacherRow>(
            r#"
            SELECT st.subject_id, tp.id, tp.user_id, u.name, u.email, tp.employee_id, tp.qualification
            FROM subject_teachers st
            JOIN teacher_profiles tp ON tp.id = st.teacher_id
            JOIN users u ON u.id = tp.user_id
            WHERE st.subject_id = ANY($1)
            ORDER BY u.name
            "#,
        )
        .bind(subject_ids)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut by_subject: HashMap<Uuid, Vec<TeacherView>> = HashMap::new();
        for row in rows {
            by_subject.entry(row.subject_id).or_default().push(row.teacher);
        }
        Ok(by_subject)
    }

    async fn subject_view(&self, subject: Subject) -> Result<SubjectView> {
        let mut teachers = self.teachers_for_subjects(&[subject.id]).await?;
        Ok(SubjectView {
            teachers: teachers.remove(&subject.id).unwrap_or_default(),
            subject,
        })
    }

    async fn write_subject_with_transaction(
        &self,
        subject: &Subject,
        teacher_ids: Option<&[Uuid]>,
        insert: bool,
        transaction: &mut Transaction<'_, Postgres>,
    ) -> Result<Subject> {
        let saved = if insert {
            sqlx::query_as::<_, Subject>(
                r#"
                INSERT INTO subjects (id, class_id, name, code, description, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, class_id, name, code, description, created_at, updated_at
                "#,
            )
            .bind(subject.id)
            .bind(subject.class_id)
            .bind(&subject.name)
            .bind(&subject.code)
            .bind(&subject.description)
            .bind(subject.created_at)
            .bind(subject.updated_at)
            .fetch_one(&mut **transaction)
            .await?
        } else {
            sqlx::query_as::<_, Subject>(
                r#"
                UPDATE subjects SET name = $2, code = $3, description = $4, updated_at = $5
                WHERE id = $1
                RETURNING id, class_id, name, code, description, created_at, updated_at
                "#,
            )
            .bind(subject.id)
            .bind(&subject.name)
            .bind(&subject.code)
            .bind(&subject.description)
            .bind(subject.updated_at)
            .fetch_one(&mut **transaction)
            .await?
        };

        if let Some(teacher_ids) = teacher_ids {
            sqlx::query("DELETE FROM subject_teachers WHERE subject_id = $1")
                .bind(subject.id)
                .execute(&mut **transaction)
                .await?;

            sqlx::query(
                "INSERT INTO subject_teachers (subject_id, teacher_id) SELECT $1, UNNEST($2::uuid[])",
            )
            .bind(subject.id)
            .bind(teacher_ids)
            .execute(&mut **transaction)
            .await?;
        }

        Ok(saved)
    }

    async fn write_subject(&self, subject: &Subject, teacher_ids: Option<&[Uuid]>, insert: bool) -> Result<SubjectView> {
        let mut transaction = self.begin_transaction().await?;

        let result = self
            .write_subject_with_transaction(subject, teacher_ids, insert, &mut transaction)
            .await;

        match result {
            Ok(saved) => {
                transaction.commit().await?;
                self.subject_view(saved).await
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e)
            }
        }
    }

    async fn fetch_fee_structure(&self, fee_id: Uuid) -> Result<FeeStructureView> {
        let row = sqlx::query_as::<_, FeeRow>(&format!("{} WHERE f.id = $1", FEE_SELECT))
            .bind(fee_id)
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(row.into())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }

    fn pool_status(&self) -> PoolStatus {
        PoolStatus {
            total_connections: self.pool.size(),
            idle_connections: self.pool.num_idle() as u32,
            // sqlx does not expose its acquire queue
            waiting_clients: 0,
        }
    }

    async fn list_classes(&self, school_id: Uuid) -> Result<Vec<ClassOverview>> {
        let rows = sqlx::query_as::<_, ClassRow>(
            r#"
            SELECT c.id, c.school_id, c.name, c.display_order, c.created_at, c.updated_at,
                   (SELECT COUNT(*) FROM sections s WHERE s.class_id = c.id) AS section_count,
                   (SELECT COUNT(*) FROM student_profiles sp
                     WHERE sp.class_id = c.id
                        OR sp.section_id IN (SELECT s.id FROM sections s WHERE s.class_id = c.id)) AS student_count
            FROM classes c
            WHERE c.school_id = $1
            ORDER BY c.display_order, c.name
            "#,
        )
        .bind(school_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ClassOverview {
                class: row.class,
                section_count: row.section_count,
                student_count: row.student_count,
            })
            .collect())
    }

    async fn find_class(&self, school_id: Uuid, class_id: Uuid) -> Result<Option<Class>> {
        let class = sqlx::query_as::<_, Class>(
            "SELECT id, school_id, name, display_order, created_at, updated_at FROM classes WHERE id = $1 AND school_id = $2",
        )
        .bind(class_id)
        .bind(school_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(class)
    }

    async fn class_name_exists(&self, school_id: Uuid, name: &str, exclude: Option<Uuid>) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM classes WHERE school_id = $1 AND name = $2 AND ($3::uuid IS NULL OR id <> $3))",
        )
        .bind(school_id)
        .bind(name)
        .bind(exclude)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }

    async fn insert_class(&self, class: &Class) -> Result<Class> {
        let class = sqlx::query_as::<_, Class>(
            r#"
            INSERT INTO classes (id, school_id, name, display_order, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, school_id, name, display_order, created_at, updated_at
            "#,
        )
        .bind(class.id)
        .bind(class.school_id)
        .bind(&class.name)
        .bind(class.display_order)
        .bind(class.created_at)
        .bind(class.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(class)
    }

    async fn update_class(&self, class: &Class) -> Result<Class> {
        let class = sqlx::query_as::<_, Class>(
            r#"
            UPDATE classes SET name = $3, display_order = $4, updated_at = $5
            WHERE id = $1 AND school_id = $2
            RETURNING id, school_id, name, display_order, created_at, updated_at
            "#,
        )
        .bind(class.id)
        .bind(class.school_id)
        .bind(&class.name)
        .bind(class.display_order)
        .bind(class.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(class)
    }

    async fn count_class_students(&self, class_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM student_profiles sp
            WHERE sp.class_id = $1
               OR sp.section_id IN (SELECT s.id FROM sections s WHERE s.class_id = $1)
            "#,
        )
        .bind(class_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(count)
    }

    async fn delete_class(&self, class_id: Uuid) -> Result<()> {
        // sections, subjects and class-scoped fees cascade in the schema
        let result = sqlx::query("DELETE FROM classes WHERE id = $1")
            .bind(class_id)
            .execute(self.pool.as_ref())
            .await?;
        debug!("Deleted class {} ({} rows)", class_id, result.rows_affected());
        Ok(())
    }

    async fn list_sections(&self, school_id: Uuid, class_id: Option<Uuid>) -> Result<Vec<SectionOverview>> {
        let rows = sqlx::query_as::<_, SectionRow>(&format!(
            "{} WHERE c.school_id = $1 AND ($2::uuid IS NULL OR s.class_id = $2) ORDER BY c.display_order, c.name, s.name",
            SECTION_SELECT
        ))
        .bind(school_id)
        .bind(class_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(SectionOverview::from).collect())
    }

    async fn find_section(&self, school_id: Uuid, section_id: Uuid) -> Result<Option<SectionOverview>> {
        let row = sqlx::query_as::<_, SectionRow>(&format!(
            "{} WHERE s.id = $1 AND c.school_id = $2",
            SECTION_SELECT
        ))
        .bind(section_id)
        .bind(school_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.map(SectionOverview::from))
    }

    async fn section_name_exists(&self, class_id: Uuid, name: &str, exclude: Option<Uuid>) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM sections WHERE class_id = $1 AND name = $2 AND ($3::uuid IS NULL OR id <> $3))",
        )
        .bind(class_id)
        .bind(name)
        .bind(exclude)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }

    async fn insert_section(&self, section: &Section) -> Result<Section> {
        let section = sqlx::query_as::<_, Section>(
            r#"
            INSERT INTO sections (id, class_id, name, capacity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, class_id, name, capacity, created_at, updated_at
            "#,
        )
        .bind(section.id)
        .bind(section.class_id)
        .bind(&section.name)
        .bind(section.capacity)
        .bind(section.created_at)
        .bind(section.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(section)
    }

    async fn update_section(&self, section: &Section) -> Result<Section> {
        let section = sqlx::query_as::<_, Section>(
            r#"
            UPDATE sections SET name = $2, capacity = $3, updated_at = $4
            WHERE id = $1
            RETURNING id, class_id, name, capacity, created_at, updated_at
            "#,
        )
        .bind(section.id)
        .bind(&section.name)
        .bind(section.capacity)
        .bind(section.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(section)
    }

    async fn delete_section(&self, section_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM sections WHERE id = $1")
            .bind(section_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn upsert_class_teacher(&self, section_id: Uuid, teacher_id: Uuid) -> Result<ClassTeacherView> {
        let row = sqlx::query_as::<_, ClassTeacherRow>(
            r#"
            WITH up AS (
                INSERT INTO section_class_teachers (id, section_id, teacher_id, assigned_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (section_id)
                DO UPDATE SET teacher_id = EXCLUDED.teacher_id, assigned_at = EXCLUDED.assigned_at
                RETURNING section_id, teacher_id, assigned_at
            )
            SELECT up.section_id, up.assigned_at,
                   tp.id, tp.user_id, u.name, u.email, tp.employee_id, tp.qualification
            FROM up
            JOIN teacher_profiles tp ON tp.id = up.teacher_id
            JOIN users u ON u.id = tp.user_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(section_id)
        .bind(teacher_id)
        .bind(Utc::now())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(ClassTeacherView {
            section_id: row.section_id,
            teacher: row.teacher,
            assigned_at: row.assigned_at,
        })
    }

    async fn remove_class_teacher(&self, section_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM section_class_teachers WHERE section_id = $1")
            .bind(section_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_subjects(&self, class_id: Uuid) -> Result<Vec<SubjectView>> {
        let subjects = sqlx::query_as::<_, Subject>(
            "SELECT id, class_id, name, code, description, created_at, updated_at FROM subjects WHERE class_id = $1 ORDER BY name",
        )
        .bind(class_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let ids: Vec<Uuid> = subjects.iter().map(|s| s.id).collect();
        let mut teachers = self.teachers_for_subjects(&ids).await?;

        Ok(subjects
            .into_iter()
            .map(|subject| SubjectView {
                teachers: teachers.remove(&subject.id).unwrap_or_default(),
                subject,
            })
            .collect())
    }

    async fn find_subject(&self, school_id: Uuid, class_id: Uuid, subject_id: Uuid) -> Result<Option<SubjectView>> {
        let subject = sqlx::query_as::<_, Subject>(
            r#"
            SELECT s.id, s.class_id, s.name, s.code, s.description, s.created_at, s.updated_at
            FROM subjects s
            JOIN classes c ON c.id = s.class_id
            WHERE s.id = $1 AND s.class_id = $2 AND c.school_id = $3
            "#,
        )
        .bind(subject_id)
        .bind(class_id)
        .bind(school_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        match subject {
            Some(subject) => Ok(Some(self.subject_view(subject).await?)),
            None => Ok(None),
        }
    }

    async fn subject_name_exists(&self, class_id: Uuid, name: &str, exclude: Option<Uuid>) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM subjects WHERE class_id = $1 AND name = $2 AND ($3::uuid IS NULL OR id <> $3))",
        )
        .bind(class_id)
        .bind(name)
        .bind(exclude)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }

    async fn insert_subject(&self, subject: &Subject, teacher_ids: Vec<Uuid>) -> Result<SubjectView> {
        self.write_subject(subject, Some(&teacher_ids), true).await
    }

    async fn update_subject(&self, subject: &Subject, teacher_ids: Option<Vec<Uuid>>) -> Result<SubjectView> {
        self.write_subject(subject, teacher_ids.as_deref(), false).await
    }

    async fn delete_subject(&self, subject_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM subjects WHERE id = $1")
            .bind(subject_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn list_teachers(&self, school_id: Uuid) -> Result<Vec<TeacherView>> {
        let teachers = sqlx::query_as::<_, TeacherView>(&format!(
            "{} WHERE u.school_id = $1 ORDER BY u.name",
            TEACHER_SELECT
        ))
        .bind(school_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(teachers)
    }

    async fn find_teacher(&self, school_id: Uuid, teacher_id: Uuid) -> Result<Option<TeacherView>> {
        let teacher = sqlx::query_as::<_, TeacherView>(&format!(
            "{} WHERE tp.id = $1 AND u.school_id = $2",
            TEACHER_SELECT
        ))
        .bind(teacher_id)
        .bind(school_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(teacher)
    }

    async fn find_teachers(&self, school_id: Uuid, teacher_ids: Vec<Uuid>) -> Result<Vec<TeacherView>> {
        let teachers = sqlx::query_as::<_, TeacherView>(&format!(
            "{} WHERE tp.id = ANY($1) AND u.school_id = $2 ORDER BY u.name",
            TEACHER_SELECT
        ))
        .bind(&teacher_ids)
        .bind(school_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(teachers)
    }

    async fn list_parents(&self, school_id: Uuid) -> Result<Vec<ParentView>> {
        let parents = sqlx::query_as::<_, ParentView>(
            r#"
            SELECT pp.id, pp.user_id, u.name, u.email, pp.phone, pp.occupation,
                   (SELECT COUNT(*) FROM parent_students ps WHERE ps.parent_id = pp.id) AS children_count
            FROM parent_profiles pp
            JOIN users u ON u.id = pp.user_id
            WHERE u.school_id = $1
            ORDER BY u.name
            "#,
        )
        .bind(school_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(parents)
    }

    async fn find_parent(&self, school_id: Uuid, parent_id: Uuid) -> Result<Option<PersonRef>> {
        let parent = sqlx::query_as::<_, PersonRef>(
            r#"
            SELECT pp.id, pp.user_id, u.name, u.email
            FROM parent_profiles pp
            JOIN users u ON u.id = pp.user_id
            WHERE pp.id = $1 AND u.school_id = $2
            "#,
        )
        .bind(parent_id)
        .bind(school_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(parent)
    }

    async fn find_student(&self, school_id: Uuid, student_id: Uuid) -> Result<Option<PersonRef>> {
        let student = sqlx::query_as::<_, PersonRef>(
            r#"
            SELECT sp.id, sp.user_id, u.name, u.email
            FROM student_profiles sp
            JOIN users u ON u.id = sp.user_id
            WHERE sp.id = $1 AND u.school_id = $2
            "#,
        )
        .bind(student_id)
        .bind(school_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(student)
    }

    async fn list_fee_structures(&self, school_id: Uuid, class_id: Option<Uuid>) -> Result<Vec<FeeStructureView>> {
        let rows = sqlx::query_as::<_, FeeRow>(&format!(
            "{} WHERE f.school_id = $1 AND ($2::uuid IS NULL OR f.class_id = $2) ORDER BY f.created_at DESC",
            FEE_SELECT
        ))
        .bind(school_id)
        .bind(class_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(FeeStructureView::from).collect())
    }

    async fn insert_fee_structure(&self, fee: &FeeStructure) -> Result<FeeStructureView> {
        sqlx::query(
            r#"
            INSERT INTO fee_structures
                (id, school_id, class_id, name, amount, frequency, due_day, description, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(fee.id)
        .bind(fee.school_id)
        .bind(fee.class_id)
        .bind(&fee.name)
        .bind(fee.amount)
        .bind(fee.frequency.as_str())
        .bind(fee.due_day)
        .bind(&fee.description)
        .bind(fee.is_active)
        .bind(fee.created_at)
        .bind(fee.updated_at)
        .execute(self.pool.as_ref())
        .await?;

        self.fetch_fee_structure(fee.id).await
    }

    async fn list_parent_students(&self, school_id: Uuid, filter: ParentStudentFilter) -> Result<Vec<ParentStudentView>> {
        let rows = sqlx::query_as::<_, ParentStudentRow>(&format!(
            r#"{}
            WHERE pu.school_id = $1
              AND ($2::uuid IS NULL OR ps.parent_id = $2)
              AND ($3::uuid IS NULL OR ps.student_id = $3)
            ORDER BY ps.created_at"#,
            PARENT_STUDENT_SELECT
        ))
        .bind(school_id)
        .bind(filter.parent_id)
        .bind(filter.student_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(ParentStudentView::from).collect())
    }

    async fn parent_student_exists(&self, parent_id: Uuid, student_id: Uuid) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM parent_students WHERE parent_id = $1 AND student_id = $2)",
        )
        .bind(parent_id)
        .bind(student_id)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(exists)
    }

    async fn insert_parent_student(&self, link: &ParentStudent) -> Result<ParentStudentView> {
        sqlx::query(
            r#"
            INSERT INTO parent_students (id, parent_id, student_id, relationship, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(link.id)
        .bind(link.parent_id)
        .bind(link.student_id)
        .bind(&link.relationship)
        .bind(link.created_at)
        .execute(self.pool.as_ref())
        .await?;

        let row = sqlx::query_as::<_, ParentStudentRow>(&format!("{} WHERE ps.id = $1", PARENT_STUDENT_SELECT))
            .bind(link.id)
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(row.into())
    }

    async fn find_parent_student(&self, school_id: Uuid, link_id: Uuid) -> Result<Option<ParentStudent>> {
        let link = sqlx::query_as::<_, ParentStudent>(
            r#"
            SELECT ps.id, ps.parent_id, ps.student_id, ps.relationship, ps.created_at
            FROM parent_students ps
            JOIN parent_profiles pp ON pp.id = ps.parent_id
            JOIN users pu ON pu.id = pp.user_id
            WHERE ps.id = $1 AND pu.school_id = $2
            "#,
        )
        .bind(link_id)
        .bind(school_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(link)
    }

    async fn delete_parent_student(&self, link_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM parent_students WHERE id = $1")
            .bind(link_id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }
}
