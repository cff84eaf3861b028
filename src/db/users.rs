//! Credential store: accounts and calendar links.

use super::{Database, now_ms, optional, time_from_sql, time_to_sql};
use crate::auth::password::{hash_password, verify_against_dummy, verify_password};
use crate::error::ApiError;
use crate::types::{CalendarCredentials, CalendarLink, User};
use anyhow::Result;
use rusqlite::{Connection, ErrorCode as SqliteErrorCode, Row, params};
use tracing::info;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, username, password_hash, calendar_credentials, \
     calendar_connected, calendar_last_sync, created_at";

fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    let credentials_json: Option<String> = row.get("calendar_credentials")?;
    let connected: bool = row.get("calendar_connected")?;
    let last_sync: Option<String> = row.get("calendar_last_sync")?;

    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        password_hash: row.get("password_hash")?,
        calendar: CalendarLink {
            credentials: credentials_json.and_then(|s| serde_json::from_str(&s).ok()),
            connected,
            last_sync: time_from_sql(last_sync),
        },
        created_at: row.get("created_at")?,
    })
}

fn get_user_internal(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    optional(conn.query_row(&sql, params![user_id], parse_user_row))
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == SqliteErrorCode::ConstraintViolation
    )
}

impl Database {
    /// Register a new account. Usernames are case-sensitive and unique.
    pub fn register_user(&self, username: &str, password: &str) -> Result<User> {
        if username.is_empty() {
            return Err(ApiError::missing_field("username").into());
        }
        if password.is_empty() {
            return Err(ApiError::missing_field("password").into());
        }

        let password_hash = hash_password(password)?;
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash,
            calendar: CalendarLink::default(),
            created_at: now_ms(),
        };

        self.with_conn(|conn| {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
                params![username],
                |row| row.get(0),
            )?;
            if exists {
                return Err(ApiError::duplicate_username().into());
            }

            conn.execute(
                "INSERT INTO users (id, username, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![&user.id, &user.username, &user.password_hash, user.created_at],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    anyhow::Error::from(ApiError::duplicate_username())
                } else {
                    e.into()
                }
            })?;

            Ok(())
        })?;

        info!(user_id = %user.id, "Registered user");
        Ok(user)
    }

    /// Check a username/password pair.
    ///
    /// Unknown usernames and wrong passwords fail with the same error and
    /// both run one Argon2 verification.
    pub fn verify_credentials(&self, username: &str, password: &str) -> Result<User> {
        let Some(user) = self.find_user_by_username(username)? else {
            verify_against_dummy(password)?;
            return Err(ApiError::invalid_credentials().into());
        };

        if !verify_password(password, &user.password_hash)? {
            return Err(ApiError::invalid_credentials().into());
        }

        Ok(user)
    }

    /// Get a user by ID.
    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| get_user_internal(conn, user_id))
    }

    /// Get a user by exact username.
    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS);
            optional(conn.query_row(&sql, params![username], parse_user_row))
        })
    }

    /// Attach calendar credentials and mark the link connected.
    pub fn set_calendar_link(&self, user_id: &str, credentials: &CalendarCredentials) -> Result<User> {
        let credentials_json = serde_json::to_string(credentials)?;
        let now = time_to_sql(&chrono::Utc::now());

        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET calendar_credentials = ?1, calendar_connected = 1,
                     calendar_last_sync = ?2
                 WHERE id = ?3",
                params![credentials_json, now, user_id],
            )?;
            if updated == 0 {
                return Err(ApiError::user_not_found().into());
            }
            get_user_internal(conn, user_id)?.ok_or_else(|| ApiError::user_not_found().into())
        })
    }

    /// Record a successful calendar sync.
    pub fn touch_calendar_sync(&self, user_id: &str) -> Result<()> {
        let now = time_to_sql(&chrono::Utc::now());
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET calendar_last_sync = ?1 WHERE id = ?2",
                params![now, user_id],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn code(err: anyhow::Error) -> ErrorCode {
        ApiError::from(err).code
    }

    #[test]
    fn password_hash_is_not_plaintext() {
        let db = Database::open_in_memory().unwrap();
        let user = db.register_user("alice", "pw1").unwrap();
        assert_ne!(user.password_hash, "pw1");
        assert!(!user.calendar.connected);
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let db = Database::open_in_memory().unwrap();
        db.register_user("alice", "pw1").unwrap();
        db.register_user("Alice", "pw2").unwrap();
        let err = db.register_user("alice", "pw3").unwrap_err();
        assert_eq!(code(err), ErrorCode::DuplicateUsername);
    }

    #[test]
    fn empty_fields_are_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(code(db.register_user("", "pw").unwrap_err()), ErrorCode::ValidationError);
        assert_eq!(code(db.register_user("bob", "").unwrap_err()), ErrorCode::ValidationError);
    }

    #[test]
    fn unknown_username_is_invalid_credentials() {
        let db = Database::open_in_memory().unwrap();
        db.register_user("alice", "pw1").unwrap();
        let err = db.verify_credentials("nobody", "pw1").unwrap_err();
        assert_eq!(code(err), ErrorCode::InvalidCredentials);
        let err = db.verify_credentials("alice", "wrong").unwrap_err();
        assert_eq!(code(err), ErrorCode::InvalidCredentials);
    }

    #[test]
    fn calendar_link_roundtrips() {
        let db = Database::open_in_memory().unwrap();
        let user = db.register_user("alice", "pw1").unwrap();
        let creds = CalendarCredentials {
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_at: None,
            scope: None,
            token_type: Some("Bearer".into()),
        };

        let linked = db.set_calendar_link(&user.id, &creds).unwrap();
        assert!(linked.calendar.is_usable());
        assert!(linked.calendar.last_sync.is_some());
        assert_eq!(linked.calendar.credentials, Some(creds));
    }

    #[test]
    fn calendar_link_for_unknown_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let creds = CalendarCredentials {
            access_token: "at".into(),
            refresh_token: None,
            expires_at: None,
            scope: None,
            token_type: None,
        };
        let err = db.set_calendar_link("nobody", &creds).unwrap_err();
        assert_eq!(code(err), ErrorCode::NotFound);
    }
}
