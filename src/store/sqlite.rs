use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};

use super::Store;
use super::schema::SCHEMA;
use crate::catalog::resolver::{CatalogPlan, PersistedCatalog, PersistedVersion, TemplatePlan};
use crate::config::CatalogConfig;
use crate::error::{Error, Result};
use crate::types::*;

/// SQLite-backed store.
///
/// Writes go through one connection and reads through another. With WAL
/// enabled a reader sees the last committed refresh and never waits on an
/// open refresh transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let reader = Connection::open(db_path.as_ref())?;
        reader.pragma_update(None, "foreign_keys", "ON")?;

        Ok(Self {
            conn: Mutex::new(conn),
            reader: Mutex::new(reader),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn reader(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.reader.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

const CATALOG_COLUMNS: &str = "id, name, url, branch, environment_id, last_refreshed_at";

fn catalog_from_row(row: &Row<'_>) -> rusqlite::Result<Catalog> {
    Ok(Catalog {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        branch: row.get(3)?,
        environment_id: row.get(4)?,
        last_refreshed_at: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
    })
}

fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<serde_json::Value> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

const VERSION_SELECT: &str = "SELECT v.id, v.template_id, v.environment_id, v.revision, v.version,
        v.minimum_rancher_version, v.maximum_rancher_version, v.upgrade_from, v.bindings, v.readme
     FROM versions v
     JOIN templates t ON v.template_id = t.id
     JOIN catalogs c ON t.catalog_id = c.id
     WHERE (v.environment_id = ?1 OR v.environment_id = ?2)
     AND c.name = ?3
     AND t.folder_name = ?4";

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, Version)> {
    Ok((
        row.get(0)?,
        Version {
            template_id: row.get(1)?,
            environment_id: row.get(2)?,
            revision: row.get(3)?,
            version: row.get(4)?,
            minimum_rancher_version: row.get(5)?,
            maximum_rancher_version: row.get(6)?,
            upgrade_from: row.get(7)?,
            bindings: json_column(row, 8)?,
            readme: row.get(9)?,
            files: Vec::new(),
            questions: Vec::new(),
            upgrade_version_links: BTreeMap::new(),
        },
    ))
}

/// Loads the files, questions and upgrade targets owned by a version row.
fn hydrate_version(conn: &Connection, version_id: i64, version: &mut Version) -> Result<()> {
    let mut stmt = conn.prepare("SELECT name, contents FROM files WHERE version_id = ?1 ORDER BY name")?;
    version.files = stmt
        .query_map(params![version_id], |row| {
            Ok(VersionFile {
                name: row.get(0)?,
                contents: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt =
        conn.prepare("SELECT document FROM questions WHERE version_id = ?1 ORDER BY position")?;
    version.questions = stmt
        .query_map(params![version_id], |row| Ok(Question(json_column(row, 0)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT tv.version, tv.revision
         FROM upgrade_links l
         JOIN versions tv ON l.to_version_id = tv.id
         WHERE l.from_version_id = ?1",
    )?;
    version.upgrade_version_links = stmt
        .query_map(params![version_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;

    Ok(())
}

fn template_visible(
    conn: &Connection,
    environment_id: &str,
    catalog: &str,
    template: &str,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM templates t
         JOIN catalogs c ON t.catalog_id = c.id
         WHERE (c.environment_id = ?1 OR c.environment_id = ?2)
         AND c.name = ?3
         AND t.folder_name = ?4",
        params![environment_id, GLOBAL_ENVIRONMENT, catalog, template],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn read_version(
    conn: &Connection,
    environment_id: &str,
    catalog: &str,
    template: &str,
    revision: i64,
) -> Result<Option<Version>> {
    // An environment's own catalog shadows a global one of the same name.
    let row = conn
        .query_row(
            &format!(
                "{VERSION_SELECT} AND v.revision = ?5
                 ORDER BY (v.environment_id = ?2) LIMIT 1"
            ),
            params![environment_id, GLOBAL_ENVIRONMENT, catalog, template, revision],
            version_from_row,
        )
        .optional()?;

    let Some((id, mut version)) = row else {
        return Ok(None);
    };
    hydrate_version(conn, id, &mut version)?;
    Ok(Some(version))
}

fn read_versions(
    conn: &Connection,
    environment_id: &str,
    catalog: &str,
    template: &str,
) -> Result<Vec<Version>> {
    let mut stmt = conn.prepare(&format!(
        "{VERSION_SELECT} ORDER BY v.revision, (v.environment_id = ?2)"
    ))?;
    let rows = stmt
        .query_map(
            params![environment_id, GLOBAL_ENVIRONMENT, catalog, template],
            version_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut versions = Vec::with_capacity(rows.len());
    for (id, mut version) in rows {
        hydrate_version(conn, id, &mut version)?;
        versions.push(version);
    }
    Ok(versions)
}

fn write_template_versions(
    tx: &Transaction<'_>,
    template_id: i64,
    environment_id: &str,
    plan: &TemplatePlan,
) -> Result<()> {
    for version_id in &plan.removed_version_ids {
        tx.execute(
            "DELETE FROM versions WHERE id = ?1 AND template_id = ?2",
            params![version_id, template_id],
        )?;
    }

    tx.execute(
        "DELETE FROM upgrade_links WHERE template_id = ?1",
        params![template_id],
    )?;

    let mut ids_by_revision = HashMap::with_capacity(plan.versions.len());

    for planned in &plan.versions {
        let draft = &planned.draft;
        let bindings = serde_json::to_string(&draft.bindings)?;

        let version_id = match planned.existing_id {
            Some(id) => {
                let rows = tx.execute(
                    "UPDATE versions SET environment_id = ?1, version = ?2,
                        minimum_rancher_version = ?3, maximum_rancher_version = ?4,
                        upgrade_from = ?5, bindings = ?6, readme = ?7
                     WHERE id = ?8 AND template_id = ?9 AND revision = ?10",
                    params![
                        environment_id,
                        draft.version,
                        draft.minimum_rancher_version,
                        draft.maximum_rancher_version,
                        draft.upgrade_from,
                        bindings,
                        draft.readme,
                        id,
                        template_id,
                        planned.revision,
                    ],
                )?;
                if rows == 0 {
                    return Err(Error::Conflict(format!(
                        "version {} of template {} changed during refresh",
                        draft.version, plan.folder_name
                    )));
                }
                tx.execute("DELETE FROM files WHERE version_id = ?1", params![id])?;
                tx.execute("DELETE FROM questions WHERE version_id = ?1", params![id])?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO versions (template_id, environment_id, revision, version,
                        minimum_rancher_version, maximum_rancher_version, upgrade_from, bindings, readme)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        template_id,
                        environment_id,
                        planned.revision,
                        draft.version,
                        draft.minimum_rancher_version,
                        draft.maximum_rancher_version,
                        draft.upgrade_from,
                        bindings,
                        draft.readme,
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        let mut insert_file =
            tx.prepare_cached("INSERT INTO files (version_id, name, contents) VALUES (?1, ?2, ?3)")?;
        for file in &draft.files {
            insert_file.execute(params![version_id, file.name, file.contents])?;
        }

        let mut insert_question = tx.prepare_cached(
            "INSERT INTO questions (version_id, position, document) VALUES (?1, ?2, ?3)",
        )?;
        for (position, question) in draft.questions.iter().enumerate() {
            insert_question.execute(params![
                version_id,
                position as i64,
                serde_json::to_string(&question.0)?
            ])?;
        }

        ids_by_revision.insert(planned.revision, version_id);
    }

    for link in &plan.upgrade_links {
        let (Some(from), Some(to)) = (
            ids_by_revision.get(&link.from_revision),
            ids_by_revision.get(&link.to_revision),
        ) else {
            return Err(Error::Conflict(format!(
                "upgrade link {} -> {} in template {} references an unknown revision",
                link.from_revision, link.to_revision, plan.folder_name
            )));
        };
        tx.execute(
            "INSERT INTO upgrade_links (template_id, from_version_id, to_version_id) VALUES (?1, ?2, ?3)",
            params![template_id, from, to],
        )?;
    }

    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Catalog operations

    fn upsert_catalog(&self, name: &str, config: &CatalogConfig) -> Result<Catalog> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO catalogs (name, url, branch, environment_id) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(environment_id, name) DO UPDATE SET url = excluded.url, branch = excluded.branch",
            params![name, config.url, config.branch, config.environment_id],
        )?;
        conn.query_row(
            &format!("SELECT {CATALOG_COLUMNS} FROM catalogs WHERE environment_id = ?1 AND name = ?2"),
            params![config.environment_id, name],
            catalog_from_row,
        )
        .map_err(Error::from)
    }

    fn get_catalog_by_key(&self, key: &CatalogKey) -> Result<Option<Catalog>> {
        let conn = self.reader();
        conn.query_row(
            &format!("SELECT {CATALOG_COLUMNS} FROM catalogs WHERE environment_id = ?1 AND name = ?2"),
            params![key.environment_id, key.name],
            catalog_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_catalogs(&self) -> Result<Vec<Catalog>> {
        let conn = self.reader();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalogs ORDER BY name, environment_id"
        ))?;
        let rows = stmt.query_map([], catalog_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_catalogs_by_name(&self, name: &str) -> Result<Vec<Catalog>> {
        let conn = self.reader();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CATALOG_COLUMNS} FROM catalogs WHERE name = ?1 ORDER BY environment_id"
        ))?;
        let rows = stmt.query_map(params![name], catalog_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_catalog(&self, id: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM catalogs WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Refresh operations

    fn load_persisted(&self, catalog_id: i64) -> Result<PersistedCatalog> {
        let conn = self.conn();
        let mut persisted = PersistedCatalog::default();

        let mut stmt = conn.prepare("SELECT id, folder_name FROM templates WHERE catalog_id = ?1")?;
        let rows = stmt.query_map(params![catalog_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (id, folder) = row?;
            persisted.templates.entry(folder).or_default().template_id = Some(id);
        }

        let mut stmt = conn.prepare(
            "SELECT folder_name, last_revision FROM revision_counters WHERE catalog_id = ?1",
        )?;
        let rows = stmt.query_map(params![catalog_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (folder, last_revision) = row?;
            persisted.templates.entry(folder).or_default().last_revision = last_revision;
        }

        let mut stmt = conn.prepare(
            "SELECT t.folder_name, v.id, v.revision, v.version
             FROM versions v
             JOIN templates t ON v.template_id = t.id
             WHERE t.catalog_id = ?1
             ORDER BY v.revision",
        )?;
        let rows = stmt.query_map(params![catalog_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                PersistedVersion {
                    id: row.get(1)?,
                    revision: row.get(2)?,
                    version: row.get(3)?,
                },
            ))
        })?;
        for row in rows {
            let (folder, version) = row?;
            persisted.templates.entry(folder).or_default().versions.push(version);
        }

        Ok(persisted)
    }

    fn commit_refresh(&self, catalog_id: i64, plan: &CatalogPlan) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let environment_id: String = tx
            .query_row(
                "SELECT environment_id FROM catalogs WHERE id = ?1",
                params![catalog_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(Error::NotFound)?;

        let existing: HashMap<String, i64> = {
            let mut stmt =
                tx.prepare("SELECT folder_name, id FROM templates WHERE catalog_id = ?1")?;
            let rows = stmt.query_map(params![catalog_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<std::result::Result<_, _>>()?
        };

        for folder in &plan.removed_templates {
            tx.execute(
                "DELETE FROM templates WHERE catalog_id = ?1 AND folder_name = ?2",
                params![catalog_id, folder],
            )?;
        }

        for template in &plan.templates {
            let meta = &template.meta;
            let template_id = match existing.get(&template.folder_name) {
                Some(&id) => {
                    tx.execute(
                        "UPDATE templates SET name = ?1, description = ?2, category = ?3,
                            maintainer = ?4, license = ?5, project_url = ?6, default_version = ?7
                         WHERE id = ?8",
                        params![
                            meta.name,
                            meta.description,
                            meta.category,
                            meta.maintainer,
                            meta.license,
                            meta.project_url,
                            meta.default_version,
                            id,
                        ],
                    )?;
                    id
                }
                None => {
                    tx.execute(
                        "INSERT INTO templates (catalog_id, folder_name, name, description, category,
                            maintainer, license, project_url, default_version)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                        params![
                            catalog_id,
                            template.folder_name,
                            meta.name,
                            meta.description,
                            meta.category,
                            meta.maintainer,
                            meta.license,
                            meta.project_url,
                            meta.default_version,
                        ],
                    )?;
                    tx.last_insert_rowid()
                }
            };

            write_template_versions(&tx, template_id, &environment_id, template)?;

            tx.execute(
                "INSERT INTO revision_counters (catalog_id, folder_name, last_revision)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(catalog_id, folder_name)
                 DO UPDATE SET last_revision = MAX(last_revision, excluded.last_revision)",
                params![catalog_id, template.folder_name, template.last_revision],
            )?;
        }

        tx.execute(
            "UPDATE catalogs SET last_refreshed_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), catalog_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    // Read operations

    fn list_templates(&self, catalog_id: i64) -> Result<Vec<Template>> {
        let conn = self.reader();
        let mut stmt = conn.prepare(
            "SELECT id, catalog_id, folder_name, name, description, category, maintainer,
                license, project_url, default_version
             FROM templates WHERE catalog_id = ?1 ORDER BY folder_name",
        )?;

        let rows = stmt.query_map(params![catalog_id], |row| {
            Ok(Template {
                id: row.get(0)?,
                catalog_id: row.get(1)?,
                folder_name: row.get(2)?,
                meta: TemplateMeta {
                    name: row.get(3)?,
                    description: row.get(4)?,
                    category: row.get(5)?,
                    maintainer: row.get(6)?,
                    license: row.get(7)?,
                    project_url: row.get(8)?,
                    default_version: row.get(9)?,
                },
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn version_snapshot(
        &self,
        environment_id: &str,
        catalog: &str,
        template: &str,
        revision: i64,
    ) -> Result<Option<Version>> {
        let mut conn = self.reader();
        let tx = conn.transaction()?;
        if !template_visible(&tx, environment_id, catalog, template)? {
            return Ok(None);
        }
        let version = read_version(&tx, environment_id, catalog, template, revision)?;
        tx.commit()?;
        Ok(version)
    }

    fn versions_snapshot(
        &self,
        environment_id: &str,
        catalog: &str,
        template: &str,
    ) -> Result<Option<Vec<Version>>> {
        let mut conn = self.reader();
        let tx = conn.transaction()?;
        if !template_visible(&tx, environment_id, catalog, template)? {
            return Ok(None);
        }
        let versions = read_versions(&tx, environment_id, catalog, template)?;
        tx.commit()?;
        Ok(Some(versions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::parser::VersionDraft;
    use crate::catalog::resolver::PlannedVersion;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn draft(version: &str) -> VersionDraft {
        VersionDraft {
            folder: version.to_string(),
            version: version.to_string(),
            minimum_rancher_version: None,
            maximum_rancher_version: None,
            upgrade_from: None,
            files: vec![VersionFile {
                name: "docker-compose.yml".to_string(),
                contents: b"web:\n  image: nginx\n".to_vec(),
            }],
            questions: vec![Question(serde_json::json!({"variable": "port", "type": "int"}))],
            bindings: serde_json::Value::Null,
            readme: format!("readme {version}"),
        }
    }

    fn template_plan(folder: &str, versions: &[(&str, i64)]) -> TemplatePlan {
        TemplatePlan {
            folder_name: folder.to_string(),
            meta: TemplateMeta::default(),
            versions: versions
                .iter()
                .map(|(version, revision)| PlannedVersion {
                    existing_id: None,
                    revision: *revision,
                    draft: draft(version),
                })
                .collect(),
            removed_version_ids: Vec::new(),
            last_revision: versions.iter().map(|(_, r)| *r).max().unwrap_or(0),
            upgrade_links: Vec::new(),
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let (_temp, store) = test_store();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "catalogs",
            "templates",
            "revision_counters",
            "versions",
            "files",
            "questions",
            "upgrade_links",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_upsert_catalog_idempotent() {
        let (_temp, store) = test_store();

        let first = store
            .upsert_catalog("library", &CatalogConfig::new("https://a.example/c.git"))
            .unwrap();
        let second = store
            .upsert_catalog(
                "library",
                &CatalogConfig::new("https://b.example/c.git").with_branch("stable"),
            )
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.url, "https://b.example/c.git");
        assert_eq!(second.branch, "stable");
        assert_eq!(store.list_catalogs().unwrap().len(), 1);

        let scoped = store
            .upsert_catalog(
                "library",
                &CatalogConfig::new("https://a.example/c.git").with_environment("1a5"),
            )
            .unwrap();
        assert_ne!(scoped.id, first.id);
        assert_eq!(store.list_catalogs_by_name("library").unwrap().len(), 2);
    }

    #[test]
    fn test_commit_and_lookup() {
        let (_temp, store) = test_store();
        let catalog = store
            .upsert_catalog("library", &CatalogConfig::new("/srv/catalog"))
            .unwrap();

        let mut template = template_plan("mysql", &[("5.7.0", 1), ("5.7.1", 2)]);
        template.upgrade_links = vec![UpgradeLink {
            from_revision: 1,
            to_revision: 2,
        }];
        let plan = CatalogPlan {
            templates: vec![template],
            removed_templates: Vec::new(),
        };
        store.commit_refresh(catalog.id, &plan).unwrap();

        let version = store
            .version_snapshot("1a5", "library", "mysql", 1)
            .unwrap()
            .unwrap();
        assert_eq!(version.version, "5.7.0");
        assert_eq!(version.environment_id, "global");
        assert_eq!(version.files.len(), 1);
        assert_eq!(version.questions[0].variable(), Some("port"));
        assert_eq!(version.readme, "readme 5.7.0");
        assert_eq!(version.upgrade_version_links.get("5.7.1"), Some(&2));

        let versions = store
            .versions_snapshot("1a5", "library", "mysql")
            .unwrap()
            .unwrap();
        assert_eq!(versions.len(), 2);
        assert!(store.versions_snapshot("1a5", "library", "redis").unwrap().is_none());
        assert!(
            store
                .version_snapshot("1a5", "library", "redis", 1)
                .unwrap()
                .is_none()
        );

        let refreshed = store.get_catalog_by_key(&catalog.key()).unwrap().unwrap();
        assert!(refreshed.last_refreshed_at.is_some());
    }

    #[test]
    fn test_failed_commit_rolls_back() {
        let (_temp, store) = test_store();
        let catalog = store
            .upsert_catalog("library", &CatalogConfig::new("/srv/catalog"))
            .unwrap();

        let good = CatalogPlan {
            templates: vec![template_plan("mysql", &[("5.7.0", 1)])],
            removed_templates: Vec::new(),
        };
        store.commit_refresh(catalog.id, &good).unwrap();

        // The second template violates UNIQUE(template_id, revision) after the
        // first one has already been rewritten.
        let bad = CatalogPlan {
            templates: vec![
                template_plan("alpha", &[("1.0.0", 1)]),
                template_plan("mysql", &[("5.7.0", 7), ("5.7.1", 7)]),
            ],
            removed_templates: Vec::new(),
        };
        assert!(store.commit_refresh(catalog.id, &bad).is_err());

        let templates: Vec<_> = store
            .list_templates(catalog.id)
            .unwrap()
            .into_iter()
            .map(|t| t.folder_name)
            .collect();
        assert_eq!(templates, vec!["mysql".to_string()]);
        let versions = store
            .versions_snapshot("global", "library", "mysql")
            .unwrap()
            .unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].revision, 1);
    }

    #[test]
    fn test_revision_counter_survives_template_removal() {
        let (_temp, store) = test_store();
        let catalog = store
            .upsert_catalog("library", &CatalogConfig::new("/srv/catalog"))
            .unwrap();

        let plan = CatalogPlan {
            templates: vec![template_plan("mysql", &[("5.7.0", 1), ("5.7.1", 2)])],
            removed_templates: Vec::new(),
        };
        store.commit_refresh(catalog.id, &plan).unwrap();
        let removal = CatalogPlan {
            templates: Vec::new(),
            removed_templates: vec!["mysql".to_string()],
        };
        store.commit_refresh(catalog.id, &removal).unwrap();

        assert!(store.list_templates(catalog.id).unwrap().is_empty());
        let persisted = store.load_persisted(catalog.id).unwrap();
        let mysql = &persisted.templates["mysql"];
        assert_eq!(mysql.template_id, None);
        assert_eq!(mysql.last_revision, 2);
        assert!(mysql.versions.is_empty());
    }

    #[test]
    fn test_only_planned_removals_delete_templates() {
        let (_temp, store) = test_store();
        let catalog = store
            .upsert_catalog("library", &CatalogConfig::new("/srv/catalog"))
            .unwrap();

        let plan = CatalogPlan {
            templates: vec![
                template_plan("mysql", &[("5.7.0", 1)]),
                template_plan("redis", &[("3.2", 1)]),
            ],
            removed_templates: Vec::new(),
        };
        store.commit_refresh(catalog.id, &plan).unwrap();

        let plan = CatalogPlan {
            templates: Vec::new(),
            removed_templates: vec!["redis".to_string()],
        };
        store.commit_refresh(catalog.id, &plan).unwrap();

        let templates: Vec<_> = store
            .list_templates(catalog.id)
            .unwrap()
            .into_iter()
            .map(|t| t.folder_name)
            .collect();
        assert_eq!(templates, vec!["mysql".to_string()]);
    }

    #[test]
    fn test_delete_catalog_cascades() {
        let (_temp, store) = test_store();
        let catalog = store
            .upsert_catalog("library", &CatalogConfig::new("/srv/catalog"))
            .unwrap();
        let plan = CatalogPlan {
            templates: vec![template_plan("mysql", &[("5.7.0", 1)])],
            removed_templates: Vec::new(),
        };
        store.commit_refresh(catalog.id, &plan).unwrap();

        assert!(store.delete_catalog(catalog.id).unwrap());

        let conn = store.conn();
        for table in ["templates", "versions", "files", "questions", "revision_counters"] {
            let count: i64 = conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .unwrap();
            assert_eq!(count, 0, "{table} not empty");
        }
    }
}
