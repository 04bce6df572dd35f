use std::path::Path;
#[cfg(unix)]
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

use crate::error::{NavError, Result};
use crate::models::DefinitionKind;
use crate::navigation::{FacetNavigationDefinition, MirrorDefinition};

mod migration;


const DEFINITIONS_REVISION_KEY: &str = "definitions_revision";

/// SQLite persistence of navigation and mirror definitions.
#[derive(Clone)]
pub struct SqliteStateStore {
    conn: Arc<Mutex<Connection>>,
}

/// One row of `navigation_definitions`, still undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDefinition {
    pub name: String,
    pub kind: DefinitionKind,
    pub definition_json: String,
    pub revision: i64,
    pub updated_at: String,
}

impl std::fmt::Debug for SqliteStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStateStore").finish_non_exhaustive()
    }
}

impl SqliteStateStore {
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| NavError::lock_poisoned("sqlite"))?;
        f(&conn)
    }

    fn with_tx<T>(&self, f: impl FnOnce(&rusqlite::Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| NavError::lock_poisoned("sqlite"))?;
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        drop(conn);
        Ok(value)
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.migrate()?;
        #[cfg(unix)]
        harden_sqlite_permissions(path)?;
        Ok(store)
    }

    pub fn get_system_value(&self, key: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM system_kv WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    pub fn set_system_value(&self, key: &str, value: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                r"
                INSERT INTO system_kv(key, value, updated_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                  value = excluded.value,
                  updated_at = excluded.updated_at
                ",
                params![key, value, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// Stores a navigation definition and returns its new revision.
    pub fn save_navigation(&self, definition: &FacetNavigationDefinition) -> Result<i64> {
        self.save_definition(&definition.name, DefinitionKind::Navigation, definition)
    }

    /// Stores a mirror definition and returns its new revision.
    pub fn save_mirror(&self, definition: &MirrorDefinition) -> Result<i64> {
        self.save_definition(&definition.name, DefinitionKind::Mirror, definition)
    }

    fn save_definition<T: Serialize>(
        &self,
        name: &str,
        kind: DefinitionKind,
        definition: &T,
    ) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            return Err(NavError::Validation(
                "definition name must not be empty".to_string(),
            ));
        }
        let definition_json = serde_json::to_string(definition)?;
        let now = Utc::now().to_rfc3339();
        self.with_tx(|tx| {
            let existing = tx
                .query_row(
                    "SELECT kind FROM navigation_definitions WHERE name = ?1",
                    params![name],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            if let Some(existing) = existing
                && existing != kind.as_str()
            {
                return Err(NavError::Conflict(format!(
                    "`{name}` is already stored as a {existing}"
                )));
            }
            tx.execute(
                r"
                INSERT INTO navigation_definitions(name, kind, definition_json, revision, updated_at)
                VALUES (?1, ?2, ?3, 1, ?4)
                ON CONFLICT(name) DO UPDATE SET
                  definition_json = excluded.definition_json,
                  revision = navigation_definitions.revision + 1,
                  updated_at = excluded.updated_at
                ",
                params![name, kind.as_str(), definition_json, now],
            )?;
            bump_definitions_revision(tx, &now)?;
            let revision = tx.query_row(
                "SELECT revision FROM navigation_definitions WHERE name = ?1",
                params![name],
                |row| row.get::<_, i64>(0),
            )?;
            Ok(revision)
        })
    }

    pub fn delete_definition(&self, name: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        self.with_tx(|tx| {
            let affected = tx.execute(
                "DELETE FROM navigation_definitions WHERE name = ?1",
                params![name],
            )?;
            if affected > 0 {
                bump_definitions_revision(tx, &now)?;
            }
            Ok(affected > 0)
        })
    }

    pub fn get_definition(&self, name: &str) -> Result<Option<StoredDefinition>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    r"
                    SELECT name, kind, definition_json, revision, updated_at
                    FROM navigation_definitions
                    WHERE name = ?1
                    ",
                    params![name],
                    read_definition_row,
                )
                .optional()?;
            row.transpose()
        })
    }

    pub fn list_definitions(&self) -> Result<Vec<StoredDefinition>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT name, kind, definition_json, revision, updated_at
                FROM navigation_definitions
                ORDER BY kind ASC, name ASC
                ",
            )?;
            let rows = stmt.query_map([], read_definition_row)?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row??);
            }
            Ok(out)
        })
    }

    /// Counter advanced by every definition write or delete.
    pub fn definitions_revision(&self) -> Result<i64> {
        let raw = self.get_system_value(DEFINITIONS_REVISION_KEY)?;
        match raw {
            None => Ok(0),
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                NavError::Validation(format!("invalid {DEFINITIONS_REVISION_KEY}: {raw}"))
            }),
        }
    }
}

fn read_definition_row(row: &Row<'_>) -> rusqlite::Result<Result<StoredDefinition>> {
    let kind = row.get::<_, String>(1)?;
    let Some(parsed) = DefinitionKind::parse(&kind) else {
        return Ok(Err(NavError::Validation(format!(
            "unknown definition kind `{kind}`"
        ))));
    };
    Ok(Ok(StoredDefinition {
        name: row.get(0)?,
        kind: parsed,
        definition_json: row.get(2)?,
        revision: row.get(3)?,
        updated_at: row.get(4)?,
    }))
}

fn bump_definitions_revision(tx: &rusqlite::Transaction<'_>, now: &str) -> Result<()> {
    tx.execute(
        r"
        INSERT INTO system_kv(key, value, updated_at)
        VALUES (?1, '1', ?2)
        ON CONFLICT(key) DO UPDATE SET
          value = CAST(CAST(system_kv.value AS INTEGER) + 1 AS TEXT),
          updated_at = excluded.updated_at
        ",
        params![DEFINITIONS_REVISION_KEY, now],
    )?;
    Ok(())
}

#[cfg(unix)]
fn harden_sqlite_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    for suffix in ["", "-wal", "-shm"] {
        let mut os = path.as_os_str().to_os_string();
        os.push(suffix);
        let candidate = PathBuf::from(os);
        if candidate.exists() {
            std::fs::set_permissions(candidate, std::fs::Permissions::from_mode(0o600))?;
        }
    }
    Ok(())
}
