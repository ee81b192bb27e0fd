use std::fs;
use std::path::{Path, PathBuf};

use git2::build::RepoBuilder;
use git2::{FetchOptions, Repository, ResetType};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::types::Catalog;

/// Produces a local snapshot of a catalog's source tree.
pub trait SourceProvider: Send + Sync {
    fn fetch(&self, catalog: &Catalog) -> Result<PathBuf>;
}

/// Keeps one checkout per catalog source under a cache root and brings it up
/// to date with the remote branch on every fetch.
pub struct GitSourceProvider {
    cache_root: PathBuf,
}

impl GitSourceProvider {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    /// `<cache>/<environment>/<sha256(url#branch)>`
    #[must_use]
    pub fn checkout_path(&self, catalog: &Catalog) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(catalog.url.as_bytes());
        hasher.update(b"#");
        hasher.update(catalog.branch.as_bytes());
        let digest = hex::encode(hasher.finalize());

        self.cache_root.join(&catalog.environment_id).join(&digest[..32])
    }
}

fn clone_repo(url: &str, branch: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    RepoBuilder::new()
        .branch(branch)
        .clone(url, path)
        .map_err(|e| Error::Fetch(format!("clone of {url} failed: {}", e.message())))?;
    Ok(())
}

fn update_repo(repo: &Repository, branch: &str) -> Result<()> {
    let mut remote = repo.find_remote("origin")?;
    let refspec = format!("+refs/heads/{branch}:refs/remotes/origin/{branch}");
    remote.fetch(&[refspec.as_str()], Some(&mut FetchOptions::new()), None)?;

    let target = repo
        .find_reference(&format!("refs/remotes/origin/{branch}"))
        .map_err(|_| Error::Fetch(format!("branch not found: {branch}")))?
        .peel_to_commit()?;

    repo.reset(target.as_object(), ResetType::Hard, None)?;
    Ok(())
}

impl SourceProvider for GitSourceProvider {
    fn fetch(&self, catalog: &Catalog) -> Result<PathBuf> {
        let path = self.checkout_path(catalog);

        match Repository::open(&path) {
            Ok(repo) => {
                tracing::debug!("Updating checkout of {} at {}", catalog.url, path.display());
                update_repo(&repo, &catalog.branch)?;
            }
            Err(_) => {
                if path.exists() {
                    fs::remove_dir_all(&path)?;
                }
                tracing::info!("Cloning {} ({}) into {}", catalog.url, catalog.branch, path.display());
                clone_repo(&catalog.url, &catalog.branch, &path)?;
            }
        }

        Ok(path)
    }
}
