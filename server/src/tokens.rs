use std::path::PathBuf;

use color_eyre::eyre::WrapErr;
use serde_json::Value;
use tracing::error;

use crate::oauth::exchange::TokenRecord;

/// A persisted token record as read back from disk.
#[derive(Debug, Clone)]
pub struct SavedToken {
    /// File stem, e.g. `token_20250101_093000`. Doubles as the URL id.
    pub id: String,
    /// The timestamp portion of the id, shown as the creation label.
    pub created_label: String,
    pub access_token: Option<String>,
    /// Full provider response body as saved.
    pub raw: Value,
    /// Set when the file exists but could not be read or parsed; the listing
    /// page surfaces this per entry instead of failing wholesale.
    pub read_error: Option<String>,
}

/// Flat-file storage for token records, one immutable JSON file per
/// successful exchange, keyed by retrieval timestamp.
#[derive(Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn ensure_dir(&self) -> color_eyre::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .wrap_err_with(|| format!("Failed to create {}", self.dir.display()))?;
        Ok(())
    }

    /// Write a record as `token_%Y%m%d_%H%M%S.json`, pretty-printed.
    /// Records are never overwritten or deleted; rotation is out of scope.
    pub async fn save(&self, record: &TokenRecord) -> color_eyre::Result<PathBuf> {
        let filename = format!("token_{}.json", record.retrieved_at.format("%Y%m%d_%H%M%S"));
        let path = self.dir.join(filename);

        let body = serde_json::to_string_pretty(&record.raw_response)
            .wrap_err("Failed to serialize token record")?;
        tokio::fs::write(&path, body)
            .await
            .wrap_err_with(|| format!("Failed to write token record to {}", path.display()))?;

        Ok(path)
    }

    /// All saved records, newest first. Unreadable files become entries with
    /// `read_error` set rather than sinking the whole listing.
    pub async fn list(&self) -> color_eyre::Result<Vec<SavedToken>> {
        let mut ids = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .wrap_err_with(|| format!("Failed to read {}", self.dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = name.strip_suffix(".json") {
                if is_valid_token_id(id) {
                    ids.push(id.to_string());
                }
            }
        }

        // Timestamp-keyed names sort chronologically; reverse for newest
        // first.
        ids.sort();
        ids.reverse();

        let mut tokens = Vec::with_capacity(ids.len());
        for id in ids {
            match self.read_record(&id).await {
                Ok(token) => tokens.push(token),
                Err(err) => {
                    error!(%id, ?err, "Failed to read token file");
                    tokens.push(SavedToken {
                        created_label: created_label(&id),
                        id,
                        access_token: None,
                        raw: Value::Null,
                        read_error: Some(format!("{err:#}")),
                    });
                }
            }
        }

        Ok(tokens)
    }

    /// Load a single record by id. Returns `None` for unknown ids, including
    /// anything that does not match the `token_<timestamp>` shape.
    pub async fn load(&self, id: &str) -> color_eyre::Result<Option<SavedToken>> {
        if !is_valid_token_id(id) {
            return Ok(None);
        }

        match self.read_record(id).await {
            Ok(token) => Ok(Some(token)),
            Err(err) => {
                if self.dir.join(format!("{id}.json")).exists() {
                    Err(err)
                } else {
                    Ok(None)
                }
            }
        }
    }

    async fn read_record(&self, id: &str) -> color_eyre::Result<SavedToken> {
        let path = self.dir.join(format!("{id}.json"));
        let contents = tokio::fs::read_to_string(&path)
            .await
            .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        let raw: Value = serde_json::from_str(&contents)
            .wrap_err_with(|| format!("Failed to parse {}", path.display()))?;

        Ok(SavedToken {
            id: id.to_string(),
            created_label: created_label(id),
            access_token: raw["access_token"].as_str().map(str::to_owned),
            raw,
            read_error: None,
        })
    }
}

/// Ids come in from the URL, so anything outside the generated
/// `token_<digits>_<digits>` shape is rejected before it can reach the
/// filesystem.
fn is_valid_token_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix("token_") else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '_')
}

/// "token_20250101_093000" -> "20250101_093000".
fn created_label(id: &str) -> String {
    id.strip_prefix("token_").unwrap_or(id).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record_at(ts: chrono::DateTime<chrono::Utc>, token: &str) -> TokenRecord {
        TokenRecord {
            access_token: token.to_string(),
            raw_response: serde_json::json!({
                "s": "ok",
                "access_token": token,
            }),
            retrieved_at: ts,
        }
    }

    #[tokio::test]
    async fn save_then_list_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        let ts = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 9, 30, 0).unwrap();
        let path = store.save(&record_at(ts, "TOK1")).await.unwrap();
        assert!(path.ends_with("token_20250101_093000.json"));

        let tokens = store.list().await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].id, "token_20250101_093000");
        assert_eq!(tokens[0].created_label, "20250101_093000");
        assert_eq!(tokens[0].access_token.as_deref(), Some("TOK1"));

        let loaded = store.load("token_20250101_093000").await.unwrap().unwrap();
        assert_eq!(loaded.raw["access_token"], "TOK1");
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        let older = chrono::Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let newer = chrono::Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap();
        store.save(&record_at(older, "OLD")).await.unwrap();
        store.save(&record_at(newer, "NEW")).await.unwrap();

        let tokens = store.list().await.unwrap();
        assert_eq!(tokens[0].access_token.as_deref(), Some("NEW"));
        assert_eq!(tokens[1].access_token.as_deref(), Some("OLD"));
    }

    #[tokio::test]
    async fn corrupt_file_shows_up_as_a_read_error_entry() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        tokio::fs::write(dir.path().join("token_20250101_000000.json"), "{nope")
            .await
            .unwrap();

        let tokens = store.list().await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].read_error.is_some());
        assert!(tokens[0].access_token.is_none());
    }

    #[tokio::test]
    async fn load_rejects_ids_outside_the_generated_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        assert!(store.load("../etc/passwd").await.unwrap().is_none());
        assert!(store.load("token_..%2f..").await.unwrap().is_none());
        assert!(store.load("").await.unwrap().is_none());
        assert!(store.load("token_").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_unknown_id_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());

        assert!(store.load("token_19990101_000000").await.unwrap().is_none());
    }

    #[test]
    fn token_id_validation() {
        assert!(is_valid_token_id("token_20250101_093000"));
        assert!(!is_valid_token_id("token_2025-01-01"));
        assert!(!is_valid_token_id("other_20250101"));
        assert!(!is_valid_token_id("token_20250101x"));
    }
}
