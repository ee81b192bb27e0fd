//! Turns a fetched catalog tree into template and version drafts.
//!
//! Layout of a snapshot:
//!
//! ```text
//! <template>/config.yml                      optional template metadata
//! <template>/<version>/rancher-compose.yml   version metadata under `.catalog`
//! <template>/<version>/README.md
//! <template>/<version>/**                    captured verbatim
//! ```
//!
//! A broken version folder is recorded as a [`ParseFailure`] and skipped; it
//! never aborts its template or the catalog.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::types::{Question, TemplateMeta, VersionFile};

const TEMPLATE_CONFIG_FILES: &[&str] = &["config.yml", "config.yaml"];
const VERSION_METADATA_FILES: &[&str] = &["rancher-compose.yml", "rancher-compose.yaml"];
const README_FILE: &str = "readme.md";

#[derive(Debug, Clone, PartialEq)]
pub struct VersionDraft {
    /// Folder name inside the template directory.
    pub folder: String,
    pub version: String,
    pub minimum_rancher_version: Option<String>,
    pub maximum_rancher_version: Option<String>,
    pub upgrade_from: Option<String>,
    pub files: Vec<VersionFile>,
    pub questions: Vec<Question>,
    pub bindings: serde_json::Value,
    pub readme: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateDraft {
    pub meta: TemplateMeta,
    pub versions: Vec<VersionDraft>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    /// `template` or `template/version`.
    pub folder: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ParsedCatalog {
    pub templates: BTreeMap<String, TemplateDraft>,
    pub failures: Vec<ParseFailure>,
}

#[derive(Debug, Deserialize)]
struct VersionMetadataFile {
    #[serde(rename = ".catalog")]
    catalog: Option<CatalogSection>,
}

/// Scalars are read as their literal text, so `1.10` stays `1.10`.
#[derive(Debug, Deserialize)]
struct CatalogSection {
    version: Option<String>,
    minimum_rancher_version: Option<String>,
    maximum_rancher_version: Option<String>,
    upgrade_from: Option<String>,
    #[serde(default)]
    questions: Vec<serde_yaml::Value>,
    bindings: Option<serde_yaml::Value>,
}

fn is_reserved(name: &str) -> bool {
    name.starts_with('.')
}

/// Orders `2` before `10`; non-numeric names fall back to plain ordering.
fn compare_folder_names(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn child_dirs(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if is_reserved(&name) {
            continue;
        }
        names.push(name);
    }
    names.sort_by(|a, b| compare_folder_names(a, b));
    Ok(names)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn validate_version_string(version: &str) -> Result<()> {
    if version.is_empty() {
        return Err(Error::Parse("version cannot be empty".into()));
    }
    if version.chars().any(char::is_whitespace) {
        return Err(Error::Parse(format!(
            "version '{version}' cannot contain whitespace"
        )));
    }
    Ok(())
}

fn parse_question(index: usize, value: &serde_yaml::Value) -> Result<Question> {
    if !value.is_mapping() {
        return Err(Error::Parse(format!("question {index} is not a mapping")));
    }
    let document = serde_json::to_value(value)
        .map_err(|e| Error::Parse(format!("question {index}: {e}")))?;
    let question = Question(document);
    match question.variable() {
        Some(variable) if !variable.trim().is_empty() => Ok(question),
        _ => Err(Error::Parse(format!(
            "question {index} has no `variable`"
        ))),
    }
}

fn read_yaml_file<T>(path: &Path) -> Result<Option<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_yaml::from_str(&contents)?))
}

fn first_existing(dir: &Path, candidates: &[&str]) -> Option<std::path::PathBuf> {
    candidates
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

fn collect_files(version_dir: &Path) -> Result<Vec<VersionFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(version_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Parse(format!("failed to walk folder: {e}")))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(version_dir)
            .map_err(|e| Error::Parse(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(VersionFile {
            name,
            contents: fs::read(entry.path())?,
        });
    }
    Ok(files)
}

/// Parses a single version folder.
pub fn parse_version_dir(folder: &str, version_dir: &Path) -> Result<VersionDraft> {
    let metadata_path = first_existing(version_dir, VERSION_METADATA_FILES)
        .ok_or_else(|| Error::Parse("missing rancher-compose.yml".into()))?;

    let section = read_yaml_file::<VersionMetadataFile>(&metadata_path)?
        .and_then(|m| m.catalog)
        .ok_or_else(|| Error::Parse("missing `.catalog` section".into()))?;

    let version = section
        .version
        .as_deref()
        .map(str::trim)
        .ok_or_else(|| Error::Parse("missing `version`".into()))?
        .to_string();
    validate_version_string(&version)?;

    let questions = section
        .questions
        .iter()
        .enumerate()
        .map(|(i, q)| parse_question(i, q))
        .collect::<Result<Vec<_>>>()?;

    let bindings = match section.bindings {
        None | Some(serde_yaml::Value::Null) => serde_json::Value::Null,
        Some(ref b) if b.is_mapping() => serde_json::to_value(b)
            .map_err(|e| Error::Parse(format!("bindings: {e}")))?,
        Some(_) => return Err(Error::Parse("`bindings` must be a mapping".into())),
    };

    let files = collect_files(version_dir)?;
    let readme = files
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(README_FILE))
        .map(|f| String::from_utf8_lossy(&f.contents).into_owned())
        .unwrap_or_default();

    Ok(VersionDraft {
        folder: folder.to_string(),
        version,
        minimum_rancher_version: non_empty(section.minimum_rancher_version),
        maximum_rancher_version: non_empty(section.maximum_rancher_version),
        upgrade_from: non_empty(section.upgrade_from),
        files,
        questions,
        bindings,
        readme,
    })
}

fn parse_template_meta(template_dir: &Path) -> Result<TemplateMeta> {
    match first_existing(template_dir, TEMPLATE_CONFIG_FILES) {
        Some(path) => Ok(read_yaml_file::<TemplateMeta>(&path)?.unwrap_or_default()),
        None => Ok(TemplateMeta::default()),
    }
}

fn parse_template_dir(
    folder: &str,
    template_dir: &Path,
    failures: &mut Vec<ParseFailure>,
) -> Result<TemplateDraft> {
    let meta = parse_template_meta(template_dir).unwrap_or_else(|e| {
        failures.push(ParseFailure {
            folder: folder.to_string(),
            reason: e.to_string(),
        });
        TemplateMeta::default()
    });

    let mut seen = HashSet::new();
    let mut versions = Vec::new();

    for version_folder in child_dirs(template_dir)? {
        let label = format!("{folder}/{version_folder}");
        match parse_version_dir(&version_folder, &template_dir.join(&version_folder)) {
            Ok(draft) if !seen.insert(draft.version.clone()) => {
                failures.push(ParseFailure {
                    folder: label,
                    reason: format!("duplicate version '{}'", draft.version),
                });
            }
            Ok(draft) => versions.push(draft),
            Err(e) => failures.push(ParseFailure {
                folder: label,
                reason: e.to_string(),
            }),
        }
    }

    Ok(TemplateDraft { meta, versions })
}

/// Parses every template folder under `root`.
///
/// Only an unreadable root is an error; everything below it is isolated per
/// template and per version.
pub fn parse_catalog(root: &Path) -> Result<ParsedCatalog> {
    let mut parsed = ParsedCatalog::default();

    for folder in child_dirs(root)? {
        match parse_template_dir(&folder, &root.join(&folder), &mut parsed.failures) {
            Ok(template) => {
                parsed.templates.insert(folder, template);
            }
            Err(e) => parsed.failures.push(ParseFailure {
                folder,
                reason: e.to_string(),
            }),
        }
    }

    Ok(parsed)
}
