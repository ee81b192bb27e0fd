pub const SCHEMA: &str = r#"
-- Catalogs are unique by name within an environment scope ('global' or an environment id)
CREATE TABLE IF NOT EXISTS catalogs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    branch TEXT NOT NULL DEFAULT 'master',
    environment_id TEXT NOT NULL DEFAULT 'global',
    last_refreshed_at TEXT,
    created_at TEXT DEFAULT (datetime('now')),

    UNIQUE(environment_id, name)
);

-- Templates are identified by their folder name in the catalog source
CREATE TABLE IF NOT EXISTS templates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    catalog_id INTEGER NOT NULL REFERENCES catalogs(id) ON DELETE CASCADE,
    folder_name TEXT NOT NULL,
    name TEXT,
    description TEXT,
    category TEXT,
    maintainer TEXT,
    license TEXT,
    project_url TEXT,
    default_version TEXT,

    UNIQUE(catalog_id, folder_name)
);

-- Revision high-water marks; outlive their template so revisions are never reused
CREATE TABLE IF NOT EXISTS revision_counters (
    catalog_id INTEGER NOT NULL REFERENCES catalogs(id) ON DELETE CASCADE,
    folder_name TEXT NOT NULL,
    last_revision INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (catalog_id, folder_name)
);

CREATE TABLE IF NOT EXISTS versions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    template_id INTEGER NOT NULL REFERENCES templates(id) ON DELETE CASCADE,
    environment_id TEXT NOT NULL,
    revision INTEGER NOT NULL,
    version TEXT NOT NULL,
    minimum_rancher_version TEXT,
    maximum_rancher_version TEXT,
    upgrade_from TEXT,
    bindings TEXT NOT NULL DEFAULT 'null',  -- opaque JSON document
    readme TEXT NOT NULL DEFAULT '',

    UNIQUE(template_id, revision)
);

CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version_id INTEGER NOT NULL REFERENCES versions(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    contents BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS questions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version_id INTEGER NOT NULL REFERENCES versions(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    document TEXT NOT NULL  -- opaque JSON document
);

-- Derived on every refresh; both ends belong to the same template
CREATE TABLE IF NOT EXISTS upgrade_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    template_id INTEGER NOT NULL REFERENCES templates(id) ON DELETE CASCADE,
    from_version_id INTEGER NOT NULL REFERENCES versions(id) ON DELETE CASCADE,
    to_version_id INTEGER NOT NULL REFERENCES versions(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_catalogs_name ON catalogs(name);
CREATE INDEX IF NOT EXISTS idx_templates_catalog ON templates(catalog_id);
CREATE INDEX IF NOT EXISTS idx_versions_template ON versions(template_id);
CREATE INDEX IF NOT EXISTS idx_files_version ON files(version_id);
CREATE INDEX IF NOT EXISTS idx_questions_version ON questions(version_id);
CREATE INDEX IF NOT EXISTS idx_upgrade_links_from ON upgrade_links(from_version_id);
CREATE INDEX IF NOT EXISTS idx_upgrade_links_template ON upgrade_links(template_id);
"#;
