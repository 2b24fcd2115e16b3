//! Row to wire-model conversions.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use scholar_db::models::{
    AnnouncementRow, DocumentRow, PaymentRow, PreferencesRow, ProfileFields, ResultRow, UserRow,
};
use scholar_types::{
    Announcement, CareerDocument, NotificationPreferences, Payment, Profile, SessionUser, UploadedResult,
};

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("bad timestamp '{}'", s))?
        .with_timezone(&Utc))
}

fn parse_id(s: &str) -> Result<Uuid> {
    s.parse().with_context(|| format!("bad id '{}'", s))
}

pub fn session_user(row: &UserRow) -> Result<SessionUser> {
    let name = if row.profile.name.is_empty() {
        row.email.clone()
    } else {
        row.profile.name.clone()
    };
    Ok(SessionUser {
        id: parse_id(&row.id)?,
        name,
        email: row.email.clone(),
        role: row.role.parse()?,
        profile_completed: row.profile_completed,
    })
}

pub fn profile(row: &UserRow) -> Result<Profile> {
    let p = &row.profile;
    Ok(Profile {
        id: parse_id(&row.id)?,
        name: p.name.clone(),
        sex: p.sex.clone(),
        email: row.email.clone(),
        mobile_phone: p.mobile_phone.clone(),
        university_name: p.university_name.clone(),
        university_registration_id: p.university_registration_id.clone(),
        program_name: p.program_name.clone(),
        enrolled_year: p.enrolled_year.clone(),
        enrollment_status: p.enrollment_status.parse()?,
        batch_number: p.batch_number,
        profile_image: p.profile_image.clone(),
    })
}

pub fn profile_fields(profile: &Profile) -> ProfileFields {
    ProfileFields {
        name: profile.name.clone(),
        sex: profile.sex.clone(),
        mobile_phone: profile.mobile_phone.clone(),
        university_name: profile.university_name.clone(),
        university_registration_id: profile.university_registration_id.clone(),
        program_name: profile.program_name.clone(),
        enrolled_year: profile.enrolled_year.clone(),
        enrollment_status: profile.enrollment_status.as_str().to_string(),
        batch_number: profile.batch_number,
        profile_image: profile.profile_image.clone(),
    }
}

pub fn payment(row: &PaymentRow) -> Result<Payment> {
    Ok(Payment {
        id: parse_id(&row.id)?,
        control_number: row.control_number.clone(),
        kind: row.kind.parse()?,
        status: row.status.parse()?,
        description: row.description.clone(),
        created_at: parse_timestamp(&row.created_at)?,
    })
}

pub fn uploaded_result(row: &ResultRow) -> Result<UploadedResult> {
    Ok(UploadedResult {
        id: row.file_name.clone(),
        file_name: row.file_name.clone(),
        file_size: row.file_size,
        file_type: row.file_type.clone(),
        upload_date: parse_timestamp(&row.uploaded_at)?,
        status: row.status.parse()?,
    })
}

pub fn document(row: &DocumentRow) -> Result<CareerDocument> {
    Ok(CareerDocument {
        id: row.id,
        file_name: row.file_name.clone(),
        file_type: row.file_type.clone(),
        file_size: row.file_size,
        upload_date: parse_timestamp(&row.uploaded_at)?,
    })
}

pub fn announcement(row: &AnnouncementRow, read: bool) -> Result<Announcement> {
    Ok(Announcement {
        id: parse_id(&row.id)?,
        title: row.title.clone(),
        content: row.content.clone(),
        sender_name: row.sender_name.clone(),
        sender_id: parse_id(&row.sender_id)?,
        created_at: parse_timestamp(&row.created_at)?,
        read,
    })
}

pub fn preferences(row: PreferencesRow) -> NotificationPreferences {
    NotificationPreferences {
        receive_announcements: row.receive_announcements,
        receive_payment_updates: row.receive_payment_updates,
        receive_result_updates: row.receive_result_updates,
        version: row.version,
    }
}

pub fn preferences_row(prefs: &NotificationPreferences) -> PreferencesRow {
    PreferencesRow {
        receive_announcements: prefs.receive_announcements,
        receive_payment_updates: prefs.receive_payment_updates,
        receive_result_updates: prefs.receive_result_updates,
        version: prefs.version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_sort_as_strings() {
        let a = Utc::now();
        let b = a + chrono::Duration::milliseconds(5);
        assert!(timestamp(a) < timestamp(b));
        assert_eq!(parse_timestamp(&timestamp(a)).unwrap().timestamp_micros(), a.timestamp_micros());
    }

    #[test]
    fn test_session_user_falls_back_to_email() {
        let row = UserRow {
            id: Uuid::new_v4().to_string(),
            email: "asha@example.com".into(),
            password: None,
            role: "student".into(),
            verified: true,
            profile_completed: false,
            profile: ProfileFields::default(),
            created_at: "2025-01-01 00:00:00".into(),
        };
        let user = session_user(&row).unwrap();
        assert_eq!(user.name, "asha@example.com");
        assert!(!user.profile_completed);
    }

    #[test]
    fn test_unknown_status_is_an_error() {
        let row = PaymentRow {
            id: Uuid::new_v4().to_string(),
            user_id: Uuid::new_v4().to_string(),
            kind: "university".into(),
            control_number: "123456789012".into(),
            status: "lost".into(),
            description: None,
            created_at: timestamp(Utc::now()),
        };
        assert!(payment(&row).is_err());
    }
}
