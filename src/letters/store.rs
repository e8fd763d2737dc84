//! SQLite-backed journal store: users, diary entries, favorite phrases.
//! Diary entries are unique per (user, date); writing twice overwrites.

use crate::error::{AppError, Result};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: i64,
    pub user_id: i64,
    pub entry_date: NaiveDate,
    pub content: String,
    pub mood: Option<String>,
    pub created_at: String,
    pub sent_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoritePhrase {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub author: Option<String>,
    pub created_at: String,
}

/// One unsent diary entry joined with its user, ready for the letter job.
#[derive(Debug, Clone)]
pub struct PendingLetter {
    pub entry_id: i64,
    pub user_id: i64,
    pub email: String,
    pub name: String,
    pub content: String,
    pub mood: Option<String>,
}

pub struct JournalStore {
    conn: Mutex<Connection>,
}

impl JournalStore {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS diary_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                entry_date TEXT NOT NULL,
                content TEXT NOT NULL,
                mood TEXT,
                created_at TEXT NOT NULL,
                sent_at TEXT,
                UNIQUE(user_id, entry_date)
            );
            CREATE TABLE IF NOT EXISTS favorite_phrases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                content TEXT NOT NULL,
                author TEXT,
                created_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Creates the user or refreshes their name, returning the row id.
    pub fn upsert_user(&self, email: &str, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO users (email, name, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(email) DO UPDATE SET name = excluded.name",
            params![email, name, Utc::now().to_rfc3339()],
        )?;
        let id = conn.query_row(
            "SELECT id FROM users WHERE email = ?1",
            params![email],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<JournalUser>> {
        let conn = self.conn.lock().unwrap();
        let user = conn
            .query_row(
                "SELECT id, email, name, created_at FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok(JournalUser {
                        id: row.get(0)?,
                        email: row.get(1)?,
                        name: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn diary_from_row(row: &Row<'_>) -> rusqlite::Result<DiaryEntry> {
        let date_str: String = row.get(2)?;
        let entry_date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;
        Ok(DiaryEntry {
            id: row.get(0)?,
            user_id: row.get(1)?,
            entry_date,
            content: row.get(3)?,
            mood: row.get(4)?,
            created_at: row.get(5)?,
            sent_at: row.get(6)?,
        })
    }

    /// Insert-or-overwrite for (user, date). The second write for the same
    /// day replaces content and mood; it never duplicates the row.
    pub fn upsert_diary(
        &self,
        user_id: i64,
        date: NaiveDate,
        content: &str,
        mood: Option<&str>,
    ) -> Result<DiaryEntry> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO diary_entries (user_id, entry_date, content, mood, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id, entry_date)
             DO UPDATE SET content = excluded.content, mood = excluded.mood",
            params![
                user_id,
                date.format("%Y-%m-%d").to_string(),
                content,
                mood,
                Utc::now().to_rfc3339()
            ],
        )?;
        let entry = conn.query_row(
            "SELECT id, user_id, entry_date, content, mood, created_at, sent_at
             FROM diary_entries WHERE user_id = ?1 AND entry_date = ?2",
            params![user_id, date.format("%Y-%m-%d").to_string()],
            Self::diary_from_row,
        )?;
        Ok(entry)
    }

    pub fn list_diary(&self, user_id: i64) -> Result<Vec<DiaryEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut statement = conn.prepare(
            "SELECT id, user_id, entry_date, content, mood, created_at, sent_at
             FROM diary_entries WHERE user_id = ?1 ORDER BY entry_date DESC",
        )?;
        let entries = statement
            .query_map(params![user_id], Self::diary_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn add_phrase(
        &self,
        user_id: i64,
        content: &str,
        author: Option<&str>,
    ) -> Result<FavoritePhrase> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO favorite_phrases (user_id, content, author, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, content, author, Utc::now().to_rfc3339()],
        )?;
        let id = conn.last_insert_rowid();
        let phrase = conn.query_row(
            "SELECT id, user_id, content, author, created_at FROM favorite_phrases WHERE id = ?1",
            params![id],
            |row| {
                Ok(FavoritePhrase {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    content: row.get(2)?,
                    author: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )?;
        Ok(phrase)
    }

    pub fn list_phrases(&self, user_id: i64) -> Result<Vec<FavoritePhrase>> {
        let conn = self.conn.lock().unwrap();
        let mut statement = conn.prepare(
            "SELECT id, user_id, content, author, created_at
             FROM favorite_phrases WHERE user_id = ?1 ORDER BY id",
        )?;
        let phrases = statement
            .query_map(params![user_id], |row| {
                Ok(FavoritePhrase {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    content: row.get(2)?,
                    author: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(phrases)
    }

    /// Deletes a phrase owned by the user. Returns false when nothing
    /// matched.
    pub fn delete_phrase(&self, id: i64, user_id: i64) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "DELETE FROM favorite_phrases WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(changed > 0)
    }

    /// Unsent diary entries for a date, joined with their user.
    pub fn pending_for_date(&self, date: NaiveDate) -> Result<Vec<PendingLetter>> {
        let conn = self.conn.lock().unwrap();
        let mut statement = conn.prepare(
            "SELECT de.id, de.user_id, u.email, u.name, de.content, de.mood
             FROM diary_entries de
             JOIN users u ON de.user_id = u.id
             WHERE de.entry_date = ?1 AND de.sent_at IS NULL
             ORDER BY de.id",
        )?;
        let pending = statement
            .query_map(params![date.format("%Y-%m-%d").to_string()], |row| {
                Ok(PendingLetter {
                    entry_id: row.get(0)?,
                    user_id: row.get(1)?,
                    email: row.get(2)?,
                    name: row.get(3)?,
                    content: row.get(4)?,
                    mood: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(pending)
    }

    pub fn mark_sent(&self, entry_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE diary_entries SET sent_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), entry_id],
        )?;
        if changed == 0 {
            return Err(AppError::NotFound(format!("diary entry {entry_id}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> JournalStore {
        JournalStore::open_in_memory().unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn diary_upsert_overwrites_instead_of_duplicating() {
        let store = store();
        let user_id = store.upsert_user("mina@example.com", "Mina").unwrap();
        store
            .upsert_diary(user_id, date(), "first draft", None)
            .unwrap();
        store
            .upsert_diary(user_id, date(), "second draft", Some("calm"))
            .unwrap();

        let entries = store.list_diary(user_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "second draft");
        assert_eq!(entries[0].mood.as_deref(), Some("calm"));
    }

    #[test]
    fn pending_excludes_sent_entries() {
        let store = store();
        let user_id = store.upsert_user("mina@example.com", "Mina").unwrap();
        let entry = store
            .upsert_diary(user_id, date(), "a long day", None)
            .unwrap();

        assert_eq!(store.pending_for_date(date()).unwrap().len(), 1);
        store.mark_sent(entry.id).unwrap();
        assert!(store.pending_for_date(date()).unwrap().is_empty());
    }

    #[test]
    fn phrase_delete_is_scoped_to_owner() {
        let store = store();
        let mina = store.upsert_user("mina@example.com", "Mina").unwrap();
        let june = store.upsert_user("june@example.com", "June").unwrap();
        let phrase = store
            .add_phrase(mina, "The days are long but the years are short.", None)
            .unwrap();

        assert!(!store.delete_phrase(phrase.id, june).unwrap());
        assert!(store.delete_phrase(phrase.id, mina).unwrap());
        assert!(store.list_phrases(mina).unwrap().is_empty());
    }

    #[test]
    fn upsert_user_is_stable_by_email() {
        let store = store();
        let first = store.upsert_user("mina@example.com", "Mina").unwrap();
        let second = store.upsert_user("mina@example.com", "Mina K.").unwrap();
        assert_eq!(first, second);
        let user = store.get_user_by_email("mina@example.com").unwrap().unwrap();
        assert_eq!(user.name, "Mina K.");
    }
}
