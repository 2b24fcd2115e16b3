/// Database row types. These map directly to SQLite rows and stay independent
/// of the wire model in scholar-types; enum columns are kept as their stored
/// strings and parsed at the API boundary.

pub struct UserRow {
    pub id: String,
    pub email: String,
    /// None until the signup flow sets a password.
    pub password: Option<String>,
    pub role: String,
    pub verified: bool,
    pub profile_completed: bool,
    pub profile: ProfileFields,
    pub created_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileFields {
    pub name: String,
    pub sex: String,
    pub mobile_phone: String,
    pub university_name: String,
    pub university_registration_id: String,
    pub program_name: String,
    pub enrolled_year: String,
    pub enrollment_status: String,
    pub batch_number: u32,
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub control_number: String,
    pub status: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ResultRow {
    pub user_id: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub status: String,
    pub uploaded_at: String,
}

/// A shared mentorship document. `stored_name` is the unique on-disk name;
/// `file_name` is what the uploader called it.
#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub id: i64,
    pub file_name: String,
    pub stored_name: String,
    pub file_type: String,
    pub file_size: u64,
    pub uploaded_at: String,
}

#[derive(Debug, Clone)]
pub struct AnnouncementRow {
    pub id: String,
    pub title: String,
    pub content: String,
    pub sender_id: String,
    pub sender_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreferencesRow {
    pub receive_announcements: bool,
    pub receive_payment_updates: bool,
    pub receive_result_updates: bool,
    pub version: u64,
}

impl Default for PreferencesRow {
    fn default() -> Self {
        Self {
            receive_announcements: true,
            receive_payment_updates: true,
            receive_result_updates: true,
            version: 0,
        }
    }
}
