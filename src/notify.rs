use std::path::Path;

use tracing::{info, warn};

use crate::gateway::MessagingGateway;
use crate::models::{Absentee, AbsenteeNotice, DeliveryStatus, NoticeOutcome};
use crate::pacing::Pacer;

pub const ADDRESS_PREFIX: &str = "whatsapp:";

/// Gateway address for a guardian contact. The contact is expected to already
/// be in international format and is passed through unchanged.
pub fn guardian_address(contact: &str) -> String {
    format!("{ADDRESS_PREFIX}{contact}")
}

pub fn compose_body(student_name: &str, subject: &str, date: &str) -> String {
    format!(
        "⚠️ *College Attendance Alert*\n\n\
         Dear Parent,\n\
         Your ward *{student_name}* was marked ABSENT for the *{subject}* lecture on {date}.\n\n\
         - Automated System"
    )
}

pub fn build_notice(absentee: &Absentee, subject: &str, date: &str) -> AbsenteeNotice {
    AbsenteeNotice {
        student_name: absentee.name.clone(),
        guardian_address: guardian_address(&absentee.guardian_contact),
        subject: subject.to_string(),
        date: date.to_string(),
        body: compose_body(&absentee.name, subject, date),
    }
}

/// Sends one alert per absentee, in order. A failed delivery is recorded and
/// the batch moves on to the next student.
pub async fn notify_absentees(
    gateway: &dyn MessagingGateway,
    pacer: &mut dyn Pacer,
    sender: &str,
    absentees: &[Absentee],
    subject: &str,
    date: &str,
) -> Vec<NoticeOutcome> {
    info!(count = absentees.len(), subject, date, "sending absentee alerts");

    let mut outcomes = Vec::with_capacity(absentees.len());
    for absentee in absentees {
        let status = if absentee.guardian_contact.trim().is_empty() {
            DeliveryStatus::Failed {
                error: "missing guardian contact".to_string(),
            }
        } else {
            let notice = build_notice(absentee, subject, date);
            pacer.ready().await;
            match gateway
                .submit(sender, &notice.body, &notice.guardian_address)
                .await
            {
                Ok(message_id) => {
                    info!(
                        student = %notice.student_name,
                        subject = %notice.subject,
                        date = %notice.date,
                        %message_id,
                        "alert sent"
                    );
                    DeliveryStatus::Sent { message_id }
                }
                Err(e) => DeliveryStatus::Failed {
                    error: e.to_string(),
                },
            }
        };

        if let DeliveryStatus::Failed { error } = &status {
            warn!(student = %absentee.name, %error, "alert not delivered");
        }

        outcomes.push(NoticeOutcome {
            student_name: absentee.name.clone(),
            guardian_contact: absentee.guardian_contact.clone(),
            status,
        });
    }

    outcomes
}

/// Reads a `name,parent_phone` CSV.
pub fn load_absentees(csv_path: &Path) -> anyhow::Result<Vec<Absentee>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)?;

    let mut absentees = Vec::new();
    for result in reader.deserialize::<Absentee>() {
        absentees.push(result?);
    }
    Ok(absentees)
}

/// Parses a `NAME=PHONE` command-line entry.
pub fn parse_absentee(raw: &str) -> Result<Absentee, String> {
    let (name, phone) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("expected NAME=PHONE, got {raw:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing student name in {raw:?}"));
    }
    Ok(Absentee {
        name: name.to_string(),
        guardian_contact: phone.trim().to_string(),
    })
}
