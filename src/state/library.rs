use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use super::record::CustomizationRecord;
use crate::Result;

/// Read side of the saved customizations, as seen by the order flow.
pub trait CustomizationSource: Send + Sync {
    fn customization(&self, product_id: &str) -> Result<Option<CustomizationRecord>>;
}

/// Short-lived keyed storage for orders awaiting payment confirmation.
///
/// Entries are inserted with an expiry and consumed at most once. Only the
/// contract lives here; the payment flow that needs it provides the store.
pub trait PendingOrderCache: Send + Sync {
    fn insert_with_expiry(&self, key: &str, payload: String, ttl: Duration);

    /// Remove and return the entry if it has not expired.
    fn take(&self, key: &str) -> Option<String>;
}

/// The CustomizationLibrary keeps the latest customization per product in
/// SQLite. Saves overwrite; nothing here ever deletes a record.
pub struct CustomizationLibrary {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl CustomizationLibrary {
    /// Open (or create) the library at `path`.
    ///
    /// The default location is the user's data directory:
    /// - Linux: ~/.local/share/frame-studio/customizations.db
    /// - macOS: ~/Library/Application Support/frame-studio/customizations.db
    /// - Windows: %APPDATA%\frame-studio\customizations.db
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        info!(path = %path.display(), "customization library opened");

        let library = Self {
            conn: Mutex::new(conn),
            db_path: Some(path.to_path_buf()),
        };
        library.init_schema()?;
        Ok(library)
    }

    /// Library that lives only as long as the process.
    pub fn open_in_memory() -> Result<Self> {
        let library = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: None,
        };
        library.init_schema()?;
        Ok(library)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .map(|dir| dir.join("frame-studio").join("customizations.db"))
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.lock().execute(
            "CREATE TABLE IF NOT EXISTS customizations (
                product_id      TEXT PRIMARY KEY,
                record_json     TEXT NOT NULL,
                created_at      TEXT NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Store `record` for `product_id`, replacing whatever was there.
    pub fn save(&self, product_id: &str, record: &CustomizationRecord) -> Result<()> {
        let json = record.to_json()?;
        self.conn.lock().execute(
            "INSERT INTO customizations (product_id, record_json, created_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(product_id) DO UPDATE SET
                record_json = excluded.record_json,
                created_at = excluded.created_at",
            params![product_id, json, record.created_at.to_rfc3339()],
        )?;
        debug!(product_id, "customization saved");
        Ok(())
    }

    pub fn get(&self, product_id: &str) -> Result<Option<CustomizationRecord>> {
        let json: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT record_json FROM customizations WHERE product_id = ?1",
                [product_id],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(CustomizationRecord::from_json(&json)?)),
            None => Ok(None),
        }
    }

    /// Number of products with a saved customization.
    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM customizations", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl CustomizationSource for CustomizationLibrary {
    fn customization(&self, product_id: &str) -> Result<Option<CustomizationRecord>> {
        self.get(product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::transform::{CanvasDimensions, Transform};
    use chrono::Utc;
    use std::collections::HashMap;
    use std::time::Instant;

    fn record(url_suffix: &str) -> CustomizationRecord {
        let canvas = CanvasDimensions::default();
        CustomizationRecord {
            original_image_url: format!("file:///o-{url_suffix}.jpg"),
            rendered_image_url: format!("file:///r-{url_suffix}.jpg"),
            cropped_image_url: format!("file:///c-{url_suffix}.jpg"),
            frame_image_url: "https://cdn.test/frame.png".into(),
            transform: Transform::centered(&canvas),
            canvas_dimensions: canvas,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_product_is_none() {
        let library = CustomizationLibrary::open_in_memory().unwrap();
        assert!(library.get("nope").unwrap().is_none());
        assert_eq!(library.count().unwrap(), 0);
    }

    #[test]
    fn test_last_write_wins() {
        let library = CustomizationLibrary::open_in_memory().unwrap();

        library.save("gid://product/1", &record("first")).unwrap();
        library.save("gid://product/1", &record("second")).unwrap();

        let stored = library.customization("gid://product/1").unwrap().unwrap();
        assert_eq!(stored.rendered_image_url, "file:///r-second.jpg");
        assert_eq!(library.count().unwrap(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("customizations.db");
        let saved = record("disk");

        {
            let library = CustomizationLibrary::open(&path).unwrap();
            library.save("p-9", &saved).unwrap();
        }

        let library = CustomizationLibrary::open(&path).unwrap();
        assert_eq!(library.path(), Some(path.as_path()));
        assert_eq!(library.get("p-9").unwrap(), Some(saved));
    }

    /// In-process cache used to pin down the contract.
    #[derive(Default)]
    struct MemoryCache {
        entries: Mutex<HashMap<String, (String, Instant)>>,
    }

    impl PendingOrderCache for MemoryCache {
        fn insert_with_expiry(&self, key: &str, payload: String, ttl: Duration) {
            self.entries
                .lock()
                .insert(key.to_string(), (payload, Instant::now() + ttl));
        }

        fn take(&self, key: &str) -> Option<String> {
            let (payload, expires) = self.entries.lock().remove(key)?;
            (Instant::now() < expires).then_some(payload)
        }
    }

    #[test]
    fn test_pending_orders_are_taken_once() {
        let cache: Box<dyn PendingOrderCache> = Box::new(MemoryCache::default());

        cache.insert_with_expiry("order-1", "{\"items\":1}".into(), Duration::from_secs(60));
        cache.insert_with_expiry("order-2", "{}".into(), Duration::ZERO);

        assert_eq!(cache.take("order-1").as_deref(), Some("{\"items\":1}"));
        assert_eq!(cache.take("order-1"), None);
        assert_eq!(cache.take("order-2"), None);
    }
}
