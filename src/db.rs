use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::models::{Course, Session, Student};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("schema migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read side of the attendance records used by the aggregator.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Exact-match lookup by course code.
    async fn find_course(&self, course_code: &str) -> StoreResult<Option<Course>>;

    /// Sessions of the course whose check-in window has closed.
    async fn completed_sessions(&self, course_id: &str) -> StoreResult<Vec<Session>>;

    /// Students whose enrollment set includes the course.
    async fn enrolled_students(&self, course_id: &str) -> StoreResult<Vec<Student>>;
}

pub async fn connect(config: &StoreConfig) -> StoreResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

pub async fn init_db(pool: &PgPool) -> StoreResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const COMPLETED_SESSIONS_SQL: &str = r#"
    SELECT s.course_id::text AS course_id, s.is_active,
           COALESCE(
               array_agg(a.student_id::text) FILTER (WHERE a.student_id IS NOT NULL),
               ARRAY[]::text[]
           ) AS attendees
    FROM attendance.sessions s
    LEFT JOIN attendance.session_attendees a ON a.session_id = s.id
    WHERE s.course_id = $1::uuid AND s.is_active = FALSE
    GROUP BY s.id
    ORDER BY s.started_at
"#;

const ENROLLED_STUDENTS_SQL: &str = r#"
    SELECT st.id::text AS id, st.full_name, st.prn_number, st.branch,
           array_agg(all_e.course_id::text) AS enrolled_courses
    FROM attendance.students st
    JOIN attendance.enrollments e ON e.student_id = st.id AND e.course_id = $1::uuid
    JOIN attendance.enrollments all_e ON all_e.student_id = st.id
    GROUP BY st.id
"#;

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn find_course(&self, course_code: &str) -> StoreResult<Option<Course>> {
        let row = sqlx::query(
            "SELECT id::text AS id, course_code, course_name \
             FROM attendance.courses WHERE course_code = $1",
        )
        .bind(course_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Course {
            id: row.get("id"),
            course_code: row.get("course_code"),
            course_name: row.get("course_name"),
        }))
    }

    async fn completed_sessions(&self, course_id: &str) -> StoreResult<Vec<Session>> {
        let rows = sqlx::query(COMPLETED_SESSIONS_SQL)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(Session {
                course_id: row.get("course_id"),
                is_active: row.get("is_active"),
                attendees: row.get("attendees"),
            });
        }

        Ok(sessions)
    }

    async fn enrolled_students(&self, course_id: &str) -> StoreResult<Vec<Student>> {
        let rows = sqlx::query(ENROLLED_STUDENTS_SQL)
            .bind(course_id)
            .fetch_all(&self.pool)
            .await?;

        let mut students = Vec::with_capacity(rows.len());
        for row in rows {
            students.push(Student {
                id: row.get("id"),
                name: row.get("full_name"),
                prn_number: row.get("prn_number"),
                branch: row.get("branch"),
                enrolled_courses: row.get("enrolled_courses"),
            });
        }

        Ok(students)
    }
}

/// Loads a demo course with a handful of students and closed sessions.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let course_id = Uuid::parse_str("6f1c2d8e-4b1a-4c7e-9a55-0f3d2b7c9e11")?;
    sqlx::query(
        r#"
        INSERT INTO attendance.courses (id, course_code, course_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (course_code) DO UPDATE SET course_name = EXCLUDED.course_name
        "#,
    )
    .bind(course_id)
    .bind("MT101")
    .bind("Fluid Mechanics")
    .execute(pool)
    .await?;

    let students = vec![
        (
            Uuid::parse_str("a3b9f0c2-1d4e-4f6a-8b7c-2e5d9a1f3c40")?,
            "Rahul Deshmukh",
            "2023BCE001",
            "Civil",
            "+919876543210",
        ),
        (
            Uuid::parse_str("b7e2c4d1-5a6f-4b8e-9c0d-3f1a2b4c5d61")?,
            "Sneha Kulkarni",
            "2023BCE002",
            "Civil",
            "+919876543211",
        ),
        (
            Uuid::parse_str("c1d3e5f7-2a4b-4c6d-8e0f-4a2b6c8d0e82")?,
            "Omkar Patil",
            "2023BME014",
            "Mechanical",
            "+919876543212",
        ),
    ];

    for (id, name, prn, branch, phone) in students.iter().copied() {
        sqlx::query(
            r#"
            INSERT INTO attendance.students (id, full_name, prn_number, branch, parent_phone)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET full_name = EXCLUDED.full_name, branch = EXCLUDED.branch,
                parent_phone = EXCLUDED.parent_phone
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(prn)
        .bind(branch)
        .bind(phone)
        .execute(pool)
        .await?;

        sqlx::query(
            "INSERT INTO attendance.enrollments (student_id, course_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(course_id)
        .execute(pool)
        .await?;
    }

    // Four closed lectures: the first student attends all, the second three,
    // the third only one.
    let attendance_plan: [&[usize]; 4] = [&[0, 1, 2], &[0, 1], &[0, 1], &[0]];
    let first_lecture = Utc::now() - Duration::days(28);

    for (week, present) in attendance_plan.iter().enumerate() {
        let session_id = Uuid::new_v5(&course_id, format!("lecture-{week}").as_bytes());
        let started_at = first_lecture + Duration::days(7 * week as i64);
        sqlx::query(
            r#"
            INSERT INTO attendance.sessions (id, course_id, started_at, ended_at, is_active)
            VALUES ($1, $2, $3, $4, FALSE)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(session_id)
        .bind(course_id)
        .bind(started_at)
        .bind(started_at + Duration::hours(1))
        .execute(pool)
        .await?;

        for &index in present.iter() {
            let student_id = students[index].0;
            sqlx::query(
                r#"
                INSERT INTO attendance.session_attendees (session_id, student_id, checked_in_at, device_id)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(session_id)
            .bind(student_id)
            .bind(started_at + Duration::minutes(5))
            .bind(format!("seed-device-{index}"))
            .execute(pool)
            .await?;
        }
    }

    Ok(())
}
