use crate::Database;
use crate::models::{
    AnnouncementRow, DocumentRow, PaymentRow, PreferencesRow, ProfileFields, ResultRow, UserRow,
};
use anyhow::Result;
use rusqlite::{Connection, Row, params};

const USER_COLUMNS: &str = "id, email, password, role, verified, profile_completed, name, sex, \
     mobile_phone, university_name, university_registration_id, program_name, enrolled_year, \
     enrollment_status, batch_number, profile_image, created_at";

impl Database {
    // -- Users --

    /// Insert a not-yet-verified student account. No-op if the email exists.
    pub fn create_pending_user(&self, id: &str, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (id, email) VALUES (?1, ?2)",
                (id, email),
            )?;
            Ok(inserted > 0)
        })
    }

    /// Insert a fully onboarded account, or reset the password and role of an
    /// existing one. Used to seed the administrator.
    pub fn upsert_account(
        &self,
        id: &str,
        email: &str,
        password_hash: &str,
        role: &str,
        name: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, role, verified, profile_completed, name)
                 VALUES (?1, ?2, ?3, ?4, 1, 1, ?5)
                 ON CONFLICT(email) DO UPDATE SET
                    password = excluded.password,
                    role = excluded.role,
                    verified = 1,
                    profile_completed = 1",
                (id, email, password_hash, role, name),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn mark_verified(&self, email: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE users SET verified = 1 WHERE email = ?1", [email])?;
            Ok(n > 0)
        })
    }

    pub fn set_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET password = ?2 WHERE email = ?1",
                (email, password_hash),
            )?;
            Ok(n > 0)
        })
    }

    pub fn update_password_by_id(&self, id: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET password = ?2 WHERE id = ?1",
                (id, password_hash),
            )?;
            Ok(n > 0)
        })
    }

    /// Overwrite every profile column of a user.
    pub fn write_profile(&self, id: &str, profile: &ProfileFields, completed: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE users SET
                    name = ?2, sex = ?3, mobile_phone = ?4, university_name = ?5,
                    university_registration_id = ?6, program_name = ?7, enrolled_year = ?8,
                    enrollment_status = ?9, batch_number = ?10, profile_image = ?11,
                    profile_completed = MAX(profile_completed, ?12)
                 WHERE id = ?1",
                params![
                    id,
                    profile.name,
                    profile.sex,
                    profile.mobile_phone,
                    profile.university_name,
                    profile.university_registration_id,
                    profile.program_name,
                    profile.enrolled_year,
                    profile.enrollment_status,
                    profile.batch_number,
                    profile.profile_image,
                    completed,
                ],
            )?;
            Ok(n > 0)
        })
    }

    // -- Verification codes --

    /// Store a fresh code for `email`, replacing any previous one.
    pub fn put_verification_code(&self, email: &str, code: &str, expires_at: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO verification_codes (email, code, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO UPDATE SET code = excluded.code, expires_at = excluded.expires_at",
                params![email, code, expires_at],
            )?;
            Ok(())
        })
    }

    /// Check a code and delete it when it matches. Expired codes never match.
    pub fn consume_verification_code(&self, email: &str, code: &str, now: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM verification_codes WHERE email = ?1 AND code = ?2 AND expires_at > ?3",
                params![email, code, now],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_expired_codes(&self, now: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM verification_codes WHERE expires_at <= ?1", [now])?;
            Ok(n)
        })
    }

    // -- Payments --

    pub fn insert_payment(&self, payment: &PaymentRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO payments (id, user_id, kind, control_number, status, description, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    payment.id,
                    payment.user_id,
                    payment.kind,
                    payment.control_number,
                    payment.status,
                    payment.description,
                    payment.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Newest first.
    pub fn list_payments(&self, user_id: &str) -> Result<Vec<PaymentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, kind, control_number, status, description, created_at
                 FROM payments WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id], payment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_payment(&self, id: &str) -> Result<Option<PaymentRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, kind, control_number, status, description, created_at
                 FROM payments WHERE id = ?1",
                [id],
                payment_from_row,
            )
            .optional()
        })
    }

    /// Compare-and-set on the status column. Returns false if the stored
    /// status was no longer `from`.
    pub fn update_payment_status(&self, id: &str, from: &str, to: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE payments SET status = ?3 WHERE id = ?1 AND status = ?2",
                (id, from, to),
            )?;
            Ok(n > 0)
        })
    }

    // -- Results --

    /// Insert or replace the result with the same file name for this user.
    pub fn upsert_result(&self, result: &ResultRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO results (user_id, file_name, file_size, file_type, status, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(user_id, file_name) DO UPDATE SET
                    file_size = excluded.file_size,
                    file_type = excluded.file_type,
                    status = excluded.status,
                    uploaded_at = excluded.uploaded_at",
                params![
                    result.user_id,
                    result.file_name,
                    result.file_size as i64,
                    result.file_type,
                    result.status,
                    result.uploaded_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_results(&self, user_id: &str) -> Result<Vec<ResultRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, file_name, file_size, file_type, status, uploaded_at
                 FROM results WHERE user_id = ?1
                 ORDER BY uploaded_at DESC, file_name ASC",
            )?;
            let rows = stmt
                .query_map([user_id], result_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_result(&self, user_id: &str, file_name: &str) -> Result<Option<ResultRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id, file_name, file_size, file_type, status, uploaded_at
                 FROM results WHERE user_id = ?1 AND file_name = ?2",
                (user_id, file_name),
                result_from_row,
            )
            .optional()
        })
    }

    pub fn delete_result(&self, user_id: &str, file_name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM results WHERE user_id = ?1 AND file_name = ?2",
                (user_id, file_name),
            )?;
            Ok(n > 0)
        })
    }

    // -- Documents --

    /// Store the metadata for an uploaded document; `doc.id` is ignored and
    /// the assigned id returned.
    pub fn insert_document(&self, doc: &DocumentRow) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents (file_name, stored_name, file_type, file_size, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    doc.file_name,
                    doc.stored_name,
                    doc.file_type,
                    doc.file_size as i64,
                    doc.uploaded_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_documents(&self) -> Result<Vec<DocumentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, file_name, stored_name, file_type, file_size, uploaded_at
                 FROM documents ORDER BY uploaded_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map([], document_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_document(&self, id: i64) -> Result<Option<DocumentRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, file_name, stored_name, file_type, file_size, uploaded_at
                 FROM documents WHERE id = ?1",
                [id],
                document_from_row,
            )
            .optional()
        })
    }

    // -- Announcements --

    pub fn insert_announcement(&self, a: &AnnouncementRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO announcements (id, title, content, sender_id, sender_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![a.id, a.title, a.content, a.sender_id, a.sender_name, a.created_at],
            )?;
            Ok(())
        })
    }

    /// One page of announcements, newest first, each paired with whether
    /// `user_id` has read it.
    pub fn list_announcements_for_user(
        &self,
        user_id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<(AnnouncementRow, bool)>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT a.id, a.title, a.content, a.sender_id, a.sender_name, a.created_at,
                        r.user_id IS NOT NULL
                 FROM announcements a
                 LEFT JOIN announcement_reads r
                    ON r.announcement_id = a.id AND r.user_id = ?1
                 ORDER BY a.created_at DESC, a.rowid DESC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![user_id, limit, offset as i64], |row| {
                    Ok((
                        AnnouncementRow {
                            id: row.get(0)?,
                            title: row.get(1)?,
                            content: row.get(2)?,
                            sender_id: row.get(3)?,
                            sender_name: row.get(4)?,
                            created_at: row.get(5)?,
                        },
                        row.get(6)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_announcements(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM announcements", [], |r| r.get(0))?;
            Ok(n as u64)
        })
    }

    pub fn announcement_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row("SELECT 1 FROM announcements WHERE id = ?1", [id], |_| Ok(()))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Idempotent: marking an already-read announcement is a no-op.
    pub fn mark_announcement_read(&self, announcement_id: &str, user_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO announcement_reads (announcement_id, user_id) VALUES (?1, ?2)",
                (announcement_id, user_id),
            )?;
            Ok(())
        })
    }

    // -- Notification preferences --

    pub fn get_preferences(&self, user_id: &str) -> Result<Option<PreferencesRow>> {
        self.with_conn(|conn| query_preferences(conn, user_id))
    }

    /// Write `prefs` if the stored version still equals `expected_version`
    /// (a missing row counts as version 0). Returns the stored row with its
    /// bumped version, or None on a version conflict.
    pub fn update_preferences(
        &self,
        user_id: &str,
        prefs: &PreferencesRow,
        expected_version: u64,
    ) -> Result<Option<PreferencesRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let current = query_preferences(&tx, user_id)?.unwrap_or_default();
            if current.version != expected_version {
                return Ok(None);
            }

            let stored = PreferencesRow {
                version: current.version + 1,
                ..*prefs
            };
            tx.execute(
                "INSERT INTO notification_preferences
                    (user_id, receive_announcements, receive_payment_updates, receive_result_updates, version)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET
                    receive_announcements = excluded.receive_announcements,
                    receive_payment_updates = excluded.receive_payment_updates,
                    receive_result_updates = excluded.receive_result_updates,
                    version = excluded.version",
                params![
                    user_id,
                    stored.receive_announcements,
                    stored.receive_payment_updates,
                    stored.receive_result_updates,
                    stored.version as i64,
                ],
            )?;
            tx.commit()?;
            Ok(Some(stored))
        })
    }

    // -- Token revocation --

    pub fn revoke_token(&self, token_hash: &str, expires_at: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO revoked_tokens (token_hash, expires_at) VALUES (?1, ?2)",
                params![token_hash, expires_at],
            )?;
            Ok(())
        })
    }

    pub fn is_token_revoked(&self, token_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM revoked_tokens WHERE token_hash = ?1",
                    [token_hash],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Revocations of tokens that have expired on their own are dead weight.
    pub fn delete_expired_revocations(&self, now: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM revoked_tokens WHERE expires_at <= ?1", [now])?;
            Ok(n)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                role: row.get(3)?,
                verified: row.get(4)?,
                profile_completed: row.get(5)?,
                profile: ProfileFields {
                    name: row.get(6)?,
                    sex: row.get(7)?,
                    mobile_phone: row.get(8)?,
                    university_name: row.get(9)?,
                    university_registration_id: row.get(10)?,
                    program_name: row.get(11)?,
                    enrolled_year: row.get(12)?,
                    enrollment_status: row.get(13)?,
                    batch_number: row.get(14)?,
                    profile_image: row.get(15)?,
                },
                created_at: row.get(16)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_preferences(conn: &Connection, user_id: &str) -> Result<Option<PreferencesRow>> {
    conn.query_row(
        "SELECT receive_announcements, receive_payment_updates, receive_result_updates, version
         FROM notification_preferences WHERE user_id = ?1",
        [user_id],
        |row| {
            Ok(PreferencesRow {
                receive_announcements: row.get(0)?,
                receive_payment_updates: row.get(1)?,
                receive_result_updates: row.get(2)?,
                version: row.get::<_, i64>(3)? as u64,
            })
        },
    )
    .optional()
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<PaymentRow> {
    Ok(PaymentRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        control_number: row.get(3)?,
        status: row.get(4)?,
        description: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn result_from_row(row: &Row<'_>) -> rusqlite::Result<ResultRow> {
    Ok(ResultRow {
        user_id: row.get(0)?,
        file_name: row.get(1)?,
        file_size: row.get::<_, i64>(2)? as u64,
        file_type: row.get(3)?,
        status: row.get(4)?,
        uploaded_at: row.get(5)?,
    })
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<DocumentRow> {
    Ok(DocumentRow {
        id: row.get(0)?,
        file_name: row.get(1)?,
        stored_name: row.get(2)?,
        file_type: row.get(3)?,
        file_size: row.get::<_, i64>(4)? as u64,
        uploaded_at: row.get(5)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
