use std::fmt::Write as _;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::attendance::TermworkReport;
use crate::models::{AttendanceRecord, TermworkStatus};

#[derive(Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "PRN Number")]
    prn_number: &'a str,
    #[serde(rename = "Student Name")]
    student_name: &'a str,
    #[serde(rename = "Branch")]
    branch: &'a str,
    #[serde(rename = "Total Lectures")]
    lectures_total: u32,
    #[serde(rename = "Lectures Attended")]
    lectures_attended: u32,
    #[serde(rename = "Attendance (%)")]
    percentage: f64,
    #[serde(rename = "Term-Work Status")]
    status: TermworkStatus,
}

impl<'a> From<&'a AttendanceRecord> for CsvRow<'a> {
    fn from(record: &'a AttendanceRecord) -> Self {
        Self {
            prn_number: &record.prn_number,
            student_name: &record.student_name,
            branch: &record.branch,
            lectures_total: record.lectures_total,
            lectures_attended: record.lectures_attended,
            percentage: record.percentage,
            status: record.status,
        }
    }
}

pub fn report_filename(course_code: &str) -> String {
    format!("{course_code}_termwork_report.csv")
}

/// Serializes the records in the given order, header first.
pub fn write_csv<W: io::Write>(writer: W, records: &[AttendanceRecord]) -> anyhow::Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if records.is_empty() {
        csv_writer.write_record([
            "PRN Number",
            "Student Name",
            "Branch",
            "Total Lectures",
            "Lectures Attended",
            "Attendance (%)",
            "Term-Work Status",
        ])?;
    }
    for record in records {
        csv_writer.serialize(CsvRow::from(record))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn write_report(out_dir: &Path, report: &TermworkReport) -> anyhow::Result<PathBuf> {
    let path = out_dir.join(report_filename(&report.course.course_code));
    let file = std::fs::File::create(&path)?;
    write_csv(file, &report.records)?;
    Ok(path)
}

/// Renders the first `limit` rows as a fixed-width table for the terminal.
pub fn preview(records: &[AttendanceRecord], limit: usize) -> String {
    let mut output = String::new();

    let _ = writeln!(
        output,
        "{:<14} {:<24} {:<12} {:>5} {:>8} {:>8}  {}",
        "PRN", "Student", "Branch", "Total", "Attended", "%", "Status"
    );
    for record in records.iter().take(limit) {
        let _ = writeln!(
            output,
            "{:<14} {:<24} {:<12} {:>5} {:>8} {:>8.2}  {}",
            record.prn_number,
            record.student_name,
            record.branch,
            record.lectures_total,
            record.lectures_attended,
            record.percentage,
            record.status
        );
    }
    if records.len() > limit {
        let _ = writeln!(output, "... {} more rows", records.len() - limit);
    }

    output
}
