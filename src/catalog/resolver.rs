use std::collections::{BTreeSet, HashMap};

use super::parser::{ParsedCatalog, VersionDraft};
use crate::types::{TemplateMeta, UpgradeLink};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedVersion {
    pub id: i64,
    pub revision: i64,
    pub version: String,
}

/// Stored state for one template folder. A folder whose template was deleted
/// still has an entry when its revision counter survives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistedTemplate {
    pub template_id: Option<i64>,
    pub last_revision: i64,
    pub versions: Vec<PersistedVersion>,
}

#[derive(Debug, Clone, Default)]
pub struct PersistedCatalog {
    pub templates: HashMap<String, PersistedTemplate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedVersion {
    /// Row to overwrite; `None` inserts a new version.
    pub existing_id: Option<i64>,
    pub revision: i64,
    pub draft: VersionDraft,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplatePlan {
    pub folder_name: String,
    pub meta: TemplateMeta,
    pub versions: Vec<PlannedVersion>,
    pub removed_version_ids: Vec<i64>,
    /// Revision high-water mark after this refresh.
    pub last_revision: i64,
    pub upgrade_links: Vec<UpgradeLink>,
}

/// Everything one refresh writes for a catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogPlan {
    pub templates: Vec<TemplatePlan>,
    pub removed_templates: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanStats {
    pub templates: usize,
    pub versions_added: usize,
    pub versions_updated: usize,
    pub versions_removed: usize,
    pub templates_removed: usize,
}

impl CatalogPlan {
    #[must_use]
    pub fn stats(&self) -> PlanStats {
        let mut stats = PlanStats {
            templates: self.templates.len(),
            templates_removed: self.removed_templates.len(),
            ..PlanStats::default()
        };
        for template in &self.templates {
            for version in &template.versions {
                if version.existing_id.is_some() {
                    stats.versions_updated += 1;
                } else {
                    stats.versions_added += 1;
                }
            }
            stats.versions_removed += template.removed_version_ids.len();
        }
        stats
    }
}

fn parse_semver(raw: &str) -> Option<semver::Version> {
    let s = raw.trim().trim_start_matches(['v', 'V']);
    if let Ok(version) = semver::Version::parse(s) {
        return Some(version);
    }

    let (core, rest) = match s.find(['-', '+']) {
        Some(i) => s.split_at(i),
        None => (s, ""),
    };
    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    semver::Version::parse(&format!("{}{rest}", parts.join("."))).ok()
}

/// Whether a target's `upgrade_from` hint accepts upgrading from `version`.
///
/// A bare version matches only itself; anything else is read as a semver
/// requirement such as `>=1.0.0, <2.0.0`.
#[must_use]
pub fn upgrade_accepts(hint: &str, version: &str) -> bool {
    let hint = hint.trim();
    if hint.is_empty() {
        return false;
    }
    if hint == version.trim() {
        return true;
    }
    if let Some(exact) = parse_semver(hint) {
        return parse_semver(version).is_some_and(|v| v == exact);
    }
    match (semver::VersionReq::parse(hint), parse_semver(version)) {
        (Ok(req), Some(v)) => req.matches(&v),
        _ => false,
    }
}

fn compute_upgrade_links(versions: &[PlannedVersion]) -> Vec<UpgradeLink> {
    let mut links = Vec::new();
    for target in versions {
        let Some(hint) = target.draft.upgrade_from.as_deref() else {
            continue;
        };
        for source in versions {
            if source.revision != target.revision && upgrade_accepts(hint, &source.draft.version)
            {
                links.push(UpgradeLink {
                    from_revision: source.revision,
                    to_revision: target.revision,
                });
            }
        }
    }
    links.sort_by_key(|l| (l.from_revision, l.to_revision));
    links
}

fn resolve_template(
    folder_name: String,
    meta: TemplateMeta,
    drafts: Vec<VersionDraft>,
    persisted: Option<&PersistedTemplate>,
) -> TemplatePlan {
    let mut known: HashMap<&str, &PersistedVersion> = HashMap::new();
    let mut next_revision = 0;

    if let Some(persisted) = persisted {
        next_revision = persisted.last_revision;
        for version in &persisted.versions {
            next_revision = next_revision.max(version.revision);
            known.insert(version.version.as_str(), version);
        }
    }

    let mut versions = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let planned = match known.remove(draft.version.as_str()) {
            Some(existing) => PlannedVersion {
                existing_id: Some(existing.id),
                revision: existing.revision,
                draft,
            },
            None => {
                next_revision += 1;
                PlannedVersion {
                    existing_id: None,
                    revision: next_revision,
                    draft,
                }
            }
        };
        versions.push(planned);
    }

    let mut removed_version_ids: Vec<i64> = known.values().map(|v| v.id).collect();
    removed_version_ids.sort_unstable();

    let upgrade_links = compute_upgrade_links(&versions);

    TemplatePlan {
        folder_name,
        meta,
        versions,
        removed_version_ids,
        last_revision: next_revision,
        upgrade_links,
    }
}

/// Reconciles freshly parsed drafts with what the store already holds.
///
/// Versions are matched by version string. Matches keep their revision, new
/// drafts get revisions above every revision the template has ever used, and
/// persisted versions without a draft are scheduled for removal.
#[must_use]
pub fn resolve(parsed: ParsedCatalog, persisted: &PersistedCatalog) -> CatalogPlan {
    let seen: BTreeSet<&str> = parsed.templates.keys().map(String::as_str).collect();
    let mut removed_templates: Vec<String> = persisted
        .templates
        .iter()
        .filter(|(folder, t)| t.template_id.is_some() && !seen.contains(folder.as_str()))
        .map(|(folder, _)| folder.clone())
        .collect();
    removed_templates.sort();

    let templates = parsed
        .templates
        .into_iter()
        .map(|(folder, template)| {
            let existing = persisted.templates.get(&folder);
            resolve_template(folder, template.meta, template.versions, existing)
        })
        .collect();

    CatalogPlan {
        templates,
        removed_templates,
    }
}
