use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                          TEXT PRIMARY KEY,
                email                       TEXT NOT NULL UNIQUE,
                password                    TEXT,
                role                        TEXT NOT NULL DEFAULT 'student',
                verified                    INTEGER NOT NULL DEFAULT 0,
                profile_completed           INTEGER NOT NULL DEFAULT 0,
                name                        TEXT NOT NULL DEFAULT '',
                sex                         TEXT NOT NULL DEFAULT '',
                mobile_phone                TEXT NOT NULL DEFAULT '',
                university_name             TEXT NOT NULL DEFAULT '',
                university_registration_id  TEXT NOT NULL DEFAULT '',
                program_name                TEXT NOT NULL DEFAULT '',
                enrolled_year               TEXT NOT NULL DEFAULT '',
                enrollment_status           TEXT NOT NULL DEFAULT 'Active',
                batch_number                INTEGER NOT NULL DEFAULT 0,
                profile_image               TEXT,
                created_at                  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE verification_codes (
                email       TEXT PRIMARY KEY,
                code        TEXT NOT NULL,
                expires_at  INTEGER NOT NULL
            );

            CREATE TABLE payments (
                id              TEXT PRIMARY KEY,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                kind            TEXT NOT NULL,
                control_number  TEXT NOT NULL,
                status          TEXT NOT NULL DEFAULT 'pending',
                description     TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_payments_user ON payments(user_id, created_at);

            CREATE TABLE results (
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                file_name   TEXT NOT NULL,
                file_size   INTEGER NOT NULL,
                file_type   TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'submitted',
                uploaded_at TEXT NOT NULL,
                PRIMARY KEY (user_id, file_name)
            );

            CREATE TABLE announcements (
                id          TEXT PRIMARY KEY,
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                sender_id   TEXT NOT NULL REFERENCES users(id),
                sender_name TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_announcements_created ON announcements(created_at);

            CREATE TABLE announcement_reads (
                announcement_id TEXT NOT NULL REFERENCES announcements(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                read_at         TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (announcement_id, user_id)
            );

            CREATE TABLE notification_preferences (
                user_id                 TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                receive_announcements   INTEGER NOT NULL DEFAULT 1,
                receive_payment_updates INTEGER NOT NULL DEFAULT 1,
                receive_result_updates  INTEGER NOT NULL DEFAULT 1,
                version                 INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE revoked_tokens (
                token_hash  TEXT PRIMARY KEY,
                expires_at  INTEGER NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (mentorship documents)");
        conn.execute_batch(
            "
            CREATE TABLE documents (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                file_name   TEXT NOT NULL,
                stored_name TEXT NOT NULL UNIQUE,
                file_type   TEXT NOT NULL,
                file_size   INTEGER NOT NULL,
                uploaded_at TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
