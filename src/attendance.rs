use std::collections::HashSet;

use tracing::info;

use crate::db::{RecordStore, StoreResult};
use crate::models::{
    AttendanceRecord, Course, Session, Student, TermworkStatus, MISSING_BRANCH, MISSING_NAME,
    MISSING_PRN,
};

/// Minimum attendance percentage for term-work credit.
pub const ELIGIBILITY_THRESHOLD: f64 = 75.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    CourseNotFound { course_code: String },
    NoCompletedLectures { course_code: String },
}

impl SkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::CourseNotFound { .. } => "not_found",
            SkipReason::NoCompletedLectures { .. } => "empty_dataset",
        }
    }

    pub fn message(&self) -> String {
        match self {
            SkipReason::CourseNotFound { course_code } => {
                format!("Course {course_code} not found.")
            }
            SkipReason::NoCompletedLectures { course_code } => {
                format!("No completed lectures found for course {course_code}.")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TermworkReport {
    pub course: Course,
    pub lectures_total: u32,
    pub records: Vec<AttendanceRecord>,
}

impl TermworkReport {
    pub fn eligible_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == TermworkStatus::Eligible)
            .count()
    }

    pub fn defaulters(&self) -> impl Iterator<Item = &AttendanceRecord> {
        self.records
            .iter()
            .filter(|record| record.status == TermworkStatus::Defaulter)
    }
}

#[derive(Debug, Clone)]
pub enum ReportOutcome {
    Generated(TermworkReport),
    Skipped(SkipReason),
}

/// Canonical string form of a record identifier. Every identifier equality
/// check in this module goes through here. Ids are case-sensitive.
pub fn canonical_id(raw: &str) -> String {
    raw.trim().to_string()
}

pub fn attendance_percentage(attended: u32, total: u32) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let raw = attended as f64 / total as f64 * 100.0;
    // Halves go to the even neighbour: 1/32 -> 3.12, not 3.13.
    Some((raw * 100.0).round_ties_even() / 100.0)
}

pub fn termwork_status(percentage: f64) -> TermworkStatus {
    if percentage >= ELIGIBILITY_THRESHOLD {
        TermworkStatus::Eligible
    } else {
        TermworkStatus::Defaulter
    }
}

/// Builds one record per student from the completed sessions, sorted by PRN.
/// Returns an empty list when there are no sessions.
pub fn aggregate(sessions: &[Session], students: &[Student]) -> Vec<AttendanceRecord> {
    let total = sessions.len() as u32;
    if total == 0 {
        return Vec::new();
    }

    let attendee_sets: Vec<HashSet<String>> = sessions
        .iter()
        .map(|session| session.attendees.iter().map(|id| canonical_id(id)).collect())
        .collect();

    let mut records = Vec::with_capacity(students.len());
    for student in students {
        let key = canonical_id(&student.id);
        let attended = attendee_sets.iter().filter(|set| set.contains(&key)).count() as u32;
        let percentage = attendance_percentage(attended, total).unwrap_or(0.0);

        records.push(AttendanceRecord {
            student_id: key,
            prn_number: student
                .prn_number
                .clone()
                .unwrap_or_else(|| MISSING_PRN.to_string()),
            student_name: student
                .name
                .clone()
                .unwrap_or_else(|| MISSING_NAME.to_string()),
            branch: student
                .branch
                .clone()
                .unwrap_or_else(|| MISSING_BRANCH.to_string()),
            lectures_total: total,
            lectures_attended: attended,
            percentage,
            status: termwork_status(percentage),
        });
    }

    records.sort_by(|a, b| {
        a.prn_number
            .cmp(&b.prn_number)
            .then_with(|| a.student_name.cmp(&b.student_name))
            .then_with(|| a.student_id.cmp(&b.student_id))
    });
    records
}

pub async fn compute_report(
    store: &dyn RecordStore,
    course_code: &str,
) -> StoreResult<ReportOutcome> {
    let Some(course) = store.find_course(course_code).await? else {
        return Ok(ReportOutcome::Skipped(SkipReason::CourseNotFound {
            course_code: course_code.to_string(),
        }));
    };

    let course_key = canonical_id(&course.id);
    let sessions: Vec<Session> = store
        .completed_sessions(&course.id)
        .await?
        .into_iter()
        .filter(|session| session.is_completed() && canonical_id(&session.course_id) == course_key)
        .collect();

    if sessions.is_empty() {
        return Ok(ReportOutcome::Skipped(SkipReason::NoCompletedLectures {
            course_code: course_code.to_string(),
        }));
    }

    let students: Vec<Student> = store
        .enrolled_students(&course.id)
        .await?
        .into_iter()
        .filter(|student| {
            student
                .enrolled_courses
                .iter()
                .any(|id| canonical_id(id) == course_key)
        })
        .collect();

    let records = aggregate(&sessions, &students);
    info!(
        course = %course.course_code,
        lectures = sessions.len(),
        students = records.len(),
        "computed term-work attendance"
    );

    Ok(ReportOutcome::Generated(TermworkReport {
        lectures_total: sessions.len() as u32,
        course,
        records,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn session(course_id: &str, is_active: bool, attendees: &[&str]) -> Session {
        Session {
            course_id: course_id.to_string(),
            is_active,
            attendees: attendees.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn student(id: &str, name: &str, prn: Option<&str>, courses: &[&str]) -> Student {
        Student {
            id: id.to_string(),
            name: Some(name.to_string()),
            prn_number: prn.map(str::to_string),
            branch: Some("Civil".to_string()),
            enrolled_courses: courses.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        courses: Vec<Course>,
        sessions: Vec<Session>,
        students: Vec<Student>,
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn find_course(&self, course_code: &str) -> StoreResult<Option<Course>> {
            Ok(self
                .courses
                .iter()
                .find(|course| course.course_code == course_code)
                .cloned())
        }

        async fn completed_sessions(&self, course_id: &str) -> StoreResult<Vec<Session>> {
            Ok(self
                .sessions
                .iter()
                .filter(|s| s.course_id == course_id && !s.is_active)
                .cloned()
                .collect())
        }

        async fn enrolled_students(&self, course_id: &str) -> StoreResult<Vec<Student>> {
            Ok(self
                .students
                .iter()
                .filter(|s| s.enrolled_courses.iter().any(|c| c == course_id))
                .cloned()
                .collect())
        }
    }

    fn mt101() -> Course {
        Course {
            id: "c1".to_string(),
            course_code: "MT101".to_string(),
            course_name: "Fluid Mechanics".to_string(),
        }
    }

    #[test]
    fn percentage_rounds_to_two_places() {
        assert_eq!(attendance_percentage(3, 4), Some(75.0));
        assert_eq!(attendance_percentage(2, 3), Some(66.67));
        assert_eq!(attendance_percentage(1, 3), Some(33.33));
        assert_eq!(attendance_percentage(0, 5), Some(0.0));
        assert_eq!(attendance_percentage(0, 0), None);
    }

    #[test]
    fn percentage_halves_round_to_even() {
        assert_eq!(attendance_percentage(1, 32), Some(3.12));
        assert_eq!(attendance_percentage(5, 32), Some(15.62));
        assert_eq!(attendance_percentage(25, 32), Some(78.12));
        assert_eq!(attendance_percentage(3, 32), Some(9.38));
        assert_eq!(attendance_percentage(1, 8), Some(12.5));
    }

    #[test]
    fn status_threshold_is_inclusive() {
        assert_eq!(termwork_status(75.0), TermworkStatus::Eligible);
        assert_eq!(termwork_status(74.99), TermworkStatus::Defaulter);
        assert_eq!(termwork_status(100.0), TermworkStatus::Eligible);
    }

    #[test]
    fn canonical_id_trims_but_keeps_case() {
        assert_eq!(canonical_id(" 65f1a2b3c4\n"), canonical_id("65f1a2b3c4"));
        assert_ne!(canonical_id("Stu-7"), canonical_id("stu-7"));
    }

    #[test]
    fn aggregates_worked_example() {
        let sessions = vec![
            session("c1", false, &["a", "b"]),
            session("c1", false, &["a", "b"]),
            session("c1", false, &["a", "b"]),
            session("c1", false, &["a"]),
        ];
        let students = vec![
            student("b", "Sneha", Some("P2"), &["c1"]),
            student("a", "Rahul", Some("P1"), &["c1"]),
        ];

        let records = aggregate(&sessions, &students);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].prn_number, "P1");
        assert_eq!(records[0].lectures_total, 4);
        assert_eq!(records[0].lectures_attended, 4);
        assert_eq!(records[0].percentage, 100.0);
        assert_eq!(records[0].status, TermworkStatus::Eligible);
        assert_eq!(records[1].prn_number, "P2");
        assert_eq!(records[1].lectures_attended, 3);
        assert_eq!(records[1].percentage, 75.0);
        assert_eq!(records[1].status, TermworkStatus::Eligible);
    }

    #[test]
    fn keeps_students_with_no_attendance() {
        let sessions = vec![session("c1", false, &["a"])];
        let students = vec![
            student("a", "Rahul", Some("P1"), &["c1"]),
            student("z", "Omkar", Some("P3"), &["c1"]),
        ];

        let records = aggregate(&sessions, &students);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].lectures_attended, 0);
        assert_eq!(records[1].percentage, 0.0);
        assert_eq!(records[1].status, TermworkStatus::Defaulter);
    }

    #[test]
    fn matches_ids_across_representations() {
        let sessions = vec![session("c1", false, &[" 65f1a2b3c4d5e6f708091011 "])];
        let students = vec![student("65f1a2b3c4d5e6f708091011", "Rahul", Some("P1"), &["c1"])];

        let records = aggregate(&sessions, &students);
        assert_eq!(records[0].lectures_attended, 1);
    }

    #[test]
    fn ids_differing_only_in_case_stay_distinct() {
        let sessions = vec![session("c1", false, &["Stu-7"])];
        let students = vec![
            student("Stu-7", "Rahul", Some("P1"), &["c1"]),
            student("stu-7", "Sneha", Some("P2"), &["c1"]),
        ];

        let records = aggregate(&sessions, &students);
        assert_eq!(records[0].lectures_attended, 1);
        assert_eq!(records[1].lectures_attended, 0);
    }

    #[test]
    fn duplicate_check_ins_count_once() {
        let sessions = vec![session("c1", false, &["a", "a"])];
        let students = vec![student("a", "Rahul", Some("P1"), &["c1"])];

        let records = aggregate(&sessions, &students);
        assert_eq!(records[0].lectures_attended, 1);
        assert_eq!(records[0].percentage, 100.0);
    }

    #[test]
    fn missing_prn_sorts_with_placeholder() {
        let sessions = vec![session("c1", false, &[])];
        let students = vec![
            student("x", "Zed", None, &["c1"]),
            student("y", "Amy", Some("2023BCE001"), &["c1"]),
            student("w", "Bob", Some("Z99"), &["c1"]),
        ];

        let prns: Vec<String> = aggregate(&sessions, &students)
            .into_iter()
            .map(|r| r.prn_number)
            .collect();
        assert_eq!(prns, vec!["2023BCE001", MISSING_PRN, "Z99"]);
    }

    #[test]
    fn ordering_is_independent_of_input_order() {
        let sessions = vec![session("c1", false, &["a", "c"])];
        let mut students = vec![
            student("a", "Rahul", Some("P2"), &["c1"]),
            student("b", "Sneha", Some("P1"), &["c1"]),
            student("c", "Omkar", Some("P2"), &["c1"]),
        ];

        let forward = aggregate(&sessions, &students);
        students.reverse();
        let backward = aggregate(&sessions, &students);
        assert_eq!(forward, backward);
    }

    #[test]
    fn no_sessions_yields_no_records() {
        let students = vec![student("a", "Rahul", Some("P1"), &["c1"])];
        assert!(aggregate(&[], &students).is_empty());
    }

    #[tokio::test]
    async fn unknown_course_is_skipped() {
        let store = MemoryStore::default();
        let outcome = compute_report(&store, "XX999").await.unwrap();

        match outcome {
            ReportOutcome::Skipped(reason) => assert_eq!(reason.code(), "not_found"),
            ReportOutcome::Generated(_) => panic!("expected a skipped report"),
        }
    }

    #[tokio::test]
    async fn course_without_completed_sessions_is_skipped() {
        let store = MemoryStore {
            courses: vec![mt101()],
            sessions: vec![session("c1", true, &["a"])],
            students: vec![student("a", "Rahul", Some("P1"), &["c1"])],
        };

        let outcome = compute_report(&store, "MT101").await.unwrap();
        match outcome {
            ReportOutcome::Skipped(reason) => {
                assert_eq!(reason.code(), "empty_dataset");
                assert!(reason.message().contains("MT101"));
            }
            ReportOutcome::Generated(_) => panic!("expected a skipped report"),
        }
    }

    #[tokio::test]
    async fn live_sessions_are_not_counted() {
        let store = MemoryStore {
            courses: vec![mt101()],
            sessions: vec![
                session("c1", false, &["a"]),
                session("c1", false, &[]),
                session("c1", true, &["a"]),
                session("other", false, &["a"]),
            ],
            students: vec![
                student("a", "Rahul", Some("P1"), &["c1"]),
                student("b", "Sneha", Some("P2"), &["other"]),
            ],
        };

        let ReportOutcome::Generated(report) = compute_report(&store, "MT101").await.unwrap() else {
            panic!("expected a generated report");
        };
        assert_eq!(report.lectures_total, 2);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].lectures_attended, 1);
        assert_eq!(report.records[0].percentage, 50.0);
        assert_eq!(report.eligible_count(), 0);
        assert_eq!(report.defaulters().count(), 1);
    }
}
