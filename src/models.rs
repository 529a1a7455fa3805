use std::fmt;

use serde::{Deserialize, Serialize};

pub const MISSING_PRN: &str = "N/A";
pub const MISSING_NAME: &str = "Unknown";
pub const MISSING_BRANCH: &str = "N/A";

#[derive(Debug, Clone)]
pub struct Course {
    pub id: String,
    pub course_code: String,
    pub course_name: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub course_id: String,
    /// True while the check-in window is open.
    pub is_active: bool,
    pub attendees: Vec<String>,
}

impl Session {
    pub fn is_completed(&self) -> bool {
        !self.is_active
    }
}

#[derive(Debug, Clone)]
pub struct Student {
    pub id: String,
    pub name: Option<String>,
    pub prn_number: Option<String>,
    pub branch: Option<String>,
    pub enrolled_courses: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TermworkStatus {
    Eligible,
    Defaulter,
}

impl fmt::Display for TermworkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermworkStatus::Eligible => f.write_str("Eligible"),
            TermworkStatus::Defaulter => f.write_str("Defaulter"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub student_id: String,
    pub prn_number: String,
    pub student_name: String,
    pub branch: String,
    pub lectures_total: u32,
    pub lectures_attended: u32,
    pub percentage: f64,
    pub status: TermworkStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Absentee {
    pub name: String,
    #[serde(rename = "parent_phone")]
    pub guardian_contact: String,
}

#[derive(Debug, Clone)]
pub struct AbsenteeNotice {
    pub student_name: String,
    pub guardian_address: String,
    pub subject: String,
    pub date: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent { message_id: String },
    Failed { error: String },
}

#[derive(Debug, Clone)]
pub struct NoticeOutcome {
    pub student_name: String,
    pub guardian_contact: String,
    pub status: DeliveryStatus,
}

impl NoticeOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self.status, DeliveryStatus::Sent { .. })
    }
}
