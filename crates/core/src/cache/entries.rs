//! Cache entry CRUD operations.
//!
//! Entries are captured responses keyed by request identity (method + URL)
//! within a generation. They carry no expiry; they live until overwritten or
//! until their generation is deleted.

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A captured response snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Set by the store on read; ignored on write.
    pub stored_at: Option<String>,
}

impl CacheEntry {
    pub fn new(
        method: impl Into<String>, url: impl Into<String>, status: u16, headers: Vec<(String, String)>, body: Vec<u8>,
    ) -> Self {
        Self { method: method.into(), url: url.into(), status, headers, body, stored_at: None }
    }

    pub fn key(&self) -> String {
        compute_cache_key(&self.method, &self.url)
    }
}

/// Entry metadata without the body, for listings.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntryMeta {
    pub method: String,
    pub url: String,
    pub status: u16,
    pub size_bytes: u64,
    pub stored_at: String,
}

/// Upsert one entry using an existing connection or transaction.
pub(crate) fn insert_entry(
    conn: &rusqlite::Connection, generation: &str, entry: &CacheEntry, stored_at: &str,
) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&entry.headers)?;
    conn.execute(
        "INSERT INTO entries (generation, key_hash, method, url, status, headers_json, body, stored_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(generation, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation,
            entry.key(),
            entry.method.to_ascii_uppercase(),
            &entry.url,
            entry.status,
            headers_json,
            &entry.body,
            stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Insert or update an entry, creating the generation on demand.
    pub async fn put_entry(&self, generation: &str, entry: &CacheEntry) -> Result<(), Error> {
        let generation = generation.to_string();
        let entry = entry.clone();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![generation, now],
                )?;
                insert_entry(&tx, &generation, &entry, &now)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the entry for a request identity.
    ///
    /// Returns None if the generation holds no entry for it.
    pub async fn match_entry(&self, generation: &str, method: &str, url: &str) -> Result<Option<CacheEntry>, Error> {
        let generation = generation.to_string();
        let key_hash = compute_cache_key(method, url);
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, headers_json, body, stored_at
                     FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![generation, key_hash], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, u16>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Vec<u8>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                });

                match result {
                    Ok((method, url, status, headers_json, body, stored_at)) => Ok(Some(CacheEntry {
                        method,
                        url,
                        status,
                        headers: serde_json::from_str(&headers_json)?,
                        body,
                        stored_at: Some(stored_at),
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the entry for a request identity.
    ///
    /// Returns false if there was nothing to delete.
    pub async fn delete_entry(&self, generation: &str, method: &str, url: &str) -> Result<bool, Error> {
        let generation = generation.to_string();
        let key_hash = compute_cache_key(method, url);
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE generation = ?1 AND key_hash = ?2",
                    params![generation, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries stored under a generation.
    pub async fn entry_count(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE generation = ?1",
                    params![generation],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// List entry metadata for a generation, ordered by URL.
    pub async fn list_entries(&self, generation: &str) -> Result<Vec<EntryMeta>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<EntryMeta>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT method, url, status, LENGTH(body), stored_at
                     FROM entries WHERE generation = ?1 ORDER BY url ASC, method ASC",
                )?;
                let entries = stmt
                    .query_map(params![generation], |row| {
                        Ok(EntryMeta {
                            method: row.get(0)?,
                            url: row.get(1)?,
                            status: row.get(2)?,
                            size_bytes: row.get::<_, i64>(3)? as u64,
                            stored_at: row.get(4)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entry(url: &str, body: &str) -> CacheEntry {
        CacheEntry::new(
            "GET",
            url,
            200,
            vec![("content-type".to_string(), "text/css".to_string())],
            body.as_bytes().to_vec(),
        )
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let entry = make_entry("https://example.com/static/style.css", "body{}");

        db.put_entry("v1", &entry).await.unwrap();

        let hit = db
            .match_entry("v1", "GET", "https://example.com/static/style.css")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body, b"body{}");
        assert_eq!(hit.headers, entry.headers);
        assert!(hit.stored_at.is_some());
        assert!(db.has_generation("v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_match_is_scoped_to_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("v1", &make_entry("https://example.com/a", "old")).await.unwrap();

        let other = db.match_entry("v2", "GET", "https://example.com/a").await.unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let result = db.match_entry("v1", "GET", "https://example.com/none").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("v1", &make_entry("https://example.com/a", "first")).await.unwrap();
        db.put_entry("v1", &make_entry("https://example.com/a", "second")).await.unwrap();

        let hit = db.match_entry("v1", "GET", "https://example.com/a").await.unwrap().unwrap();
        assert_eq!(hit.body, b"second");
        assert_eq!(db.entry_count("v1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_method_is_part_of_identity() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("v1", &make_entry("https://example.com/a", "a")).await.unwrap();

        let head = db.match_entry("v1", "HEAD", "https://example.com/a").await.unwrap();
        assert!(head.is_none());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("v1", &make_entry("https://example.com/a", "a")).await.unwrap();

        assert!(db.delete_entry("v1", "GET", "https://example.com/a").await.unwrap());
        assert!(!db.delete_entry("v1", "GET", "https://example.com/a").await.unwrap());
        assert_eq!(db.entry_count("v1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.put_entry("v1", &make_entry("https://example.com/b", "bbbb")).await.unwrap();
        db.put_entry("v1", &make_entry("https://example.com/a", "aa")).await.unwrap();

        let listed = db.list_entries("v1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].url, "https://example.com/a");
        assert_eq!(listed[0].size_bytes, 2);
        assert_eq!(listed[1].size_bytes, 4);
    }
}
