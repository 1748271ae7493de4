//! Repository tool: the collaborator interface used by the batch picker
//! to simulate merges locally.
//!
//! Grounded on `apoelstra-rsgit` (`git-utils`), which already opens
//! repositories and walks/merges commits with `git2` for the same shape of
//! work in `src/check-pr.rs`, plus `tempfile` for scratch clones (also used
//! there and by the teacher's own dev-dependencies).

use std::path::PathBuf;

use anyhow::{Context, Result};
use git2::{build::RepoBuilder, AnnotatedCommit, Repository};
use tempfile::TempDir;

/// A scoped clone of one repository, released on drop regardless of how the
/// caller exits (success, early return, or panic during unwind).
pub struct Workspace {
    _dir: TempDir,
    repo: Repository,
}

impl Workspace {
    /// Wraps an already-opened clone. Exposed at `pub(crate)` so other
    /// in-crate modules can build a `Workspace` around a transport of their
    /// own (e.g. tests cloning from a local path instead of a forge URL).
    pub(crate) fn from_parts(dir: TempDir, repo: Repository) -> Self {
        Self { _dir: dir, repo }
    }

    /// Configures a dummy commit identity so local merge commits can be
    /// created without relying on any ambient git config.
    pub fn configure_dummy_identity(&self) -> Result<()> {
        let mut cfg = self.repo.config().context("opening workspace git config")?;
        cfg.set_str("user.name", "tide-merge-queue")
            .context("setting workspace user.name")?;
        cfg.set_str("user.email", "tide@localhost")
            .context("setting workspace user.email")?;
        Ok(())
    }

    /// Checks out `sha`, detaching HEAD and resetting the working tree hard.
    pub fn checkout(&self, sha: &str) -> Result<()> {
        let oid = git2::Oid::from_str(sha).with_context(|| format!("parsing oid {sha}"))?;
        let commit = self
            .repo
            .find_commit(oid)
            .with_context(|| format!("finding commit {sha}"))?;
        self.repo
            .reset(commit.as_object(), git2::ResetType::Hard, None)
            .with_context(|| format!("checking out {sha}"))?;
        Ok(())
    }

    /// Attempts to merge `sha` into the current working tree.
    ///
    /// Returns `Ok(true)` when the merge applied cleanly, `Ok(false)` when it
    /// reported a conflict (the picker should skip this PR, not fail), and
    /// `Err` for any other merge error (the picker should abort).
    pub fn merge(&self, sha: &str) -> Result<bool> {
        let oid = git2::Oid::from_str(sha).with_context(|| format!("parsing oid {sha}"))?;
        let annotated: AnnotatedCommit<'_> = self
            .repo
            .find_annotated_commit(oid)
            .with_context(|| format!("finding annotated commit {sha}"))?;
        let (analysis, _pref) = self
            .repo
            .merge_analysis(&[&annotated])
            .with_context(|| format!("analyzing merge of {sha}"))?;
        if analysis.is_up_to_date() {
            return Ok(true);
        }

        self.repo
            .merge(&[&annotated], None, None)
            .with_context(|| format!("merging {sha}"))?;

        let mut index = self.repo.index().context("reading workspace index")?;
        if index.has_conflicts() {
            self.repo.cleanup_state().ok();
            self.repo
                .reset(
                    &self.repo.head()?.peel(git2::ObjectType::Commit)?,
                    git2::ResetType::Hard,
                    None,
                )
                .ok();
            return Ok(false);
        }

        let tree_oid = index.write_tree().context("writing merged tree")?;
        let tree = self.repo.find_tree(tree_oid).context("finding merged tree")?;
        let head_commit = self
            .repo
            .head()
            .context("reading workspace HEAD")?
            .peel_to_commit()
            .context("peeling HEAD to commit")?;
        let merge_commit = self
            .repo
            .find_commit(oid)
            .with_context(|| format!("finding commit {sha}"))?;
        let sig = self.repo.signature().context("building commit signature")?;
        self.repo
            .commit(
                Some("HEAD"),
                &sig,
                &sig,
                &format!("merge {sha} for speculative batch test"),
                &tree,
                &[&head_commit, &merge_commit],
            )
            .context("committing merge result")?;
        self.repo.cleanup_state().ok();
        Ok(true)
    }
}

/// Narrow capability set for the repository tool.
pub trait RepoTool: Send + Sync {
    /// Obtains a scoped clone of `org/repo` with a dummy identity configured,
    /// checked out at `base_sha`. Released (`clean`) on every exit path via
    /// [`Workspace`]'s `Drop`.
    fn scoped_clone(&self, org: &str, repo: &str, base_sha: &str) -> Result<Workspace>;
}

/// Clones over a local path template; real deployments point this at a
/// forge clone URL, but the trait itself is transport-agnostic.
pub struct Git2RepoTool {
    clone_url_template: String,
}

impl Git2RepoTool {
    /// `clone_url_template` may contain `{org}` and `{repo}` placeholders,
    /// e.g. `"https://github.com/{org}/{repo}.git"`.
    pub fn new(clone_url_template: impl Into<String>) -> Self {
        Self {
            clone_url_template: clone_url_template.into(),
        }
    }

    fn clone_url(&self, org: &str, repo: &str) -> String {
        self.clone_url_template
            .replace("{org}", org)
            .replace("{repo}", repo)
    }
}

impl RepoTool for Git2RepoTool {
    fn scoped_clone(&self, org: &str, repo: &str, base_sha: &str) -> Result<Workspace> {
        let dir = TempDir::new().context("creating scratch clone directory")?;
        let path: PathBuf = dir.path().to_path_buf();
        let url = self.clone_url(org, repo);
        let repo = RepoBuilder::new()
            .clone(&url, &path)
            .with_context(|| format!("cloning {url}"))?;
        let workspace = Workspace { _dir: dir, repo };
        workspace.configure_dummy_identity()?;
        workspace.checkout(base_sha)?;
        Ok(workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn git(repo: &std::path::Path, args: &[&str]) -> String {
        let out = Command::new("git")
            .current_dir(repo)
            .args(args)
            .output()
            .expect("spawn git");
        assert!(
            out.status.success(),
            "git {:?} failed\nstdout:\n{}\nstderr:\n{}",
            args,
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        );
        String::from_utf8_lossy(&out.stdout).to_string()
    }

    fn init_bare_origin_with_branches() -> (TempDir, String, String) {
        let origin_dir = TempDir::new().expect("create origin dir");
        let origin = origin_dir.path();
        git(origin, &["init"]);
        git(origin, &["config", "user.email", "t@example.com"]);
        git(origin, &["config", "user.name", "Tide Test"]);
        std::fs::write(origin.join("base.txt"), "base\n").unwrap();
        git(origin, &["add", "."]);
        git(origin, &["commit", "-m", "base"]);
        let base_sha = git(origin, &["rev-parse", "HEAD"]).trim().to_string();
        let initial_branch = git(origin, &["rev-parse", "--abbrev-ref", "HEAD"])
            .trim()
            .to_string();

        git(origin, &["checkout", "-b", "feature"]);
        std::fs::write(origin.join("feature.txt"), "feature\n").unwrap();
        git(origin, &["add", "."]);
        git(origin, &["commit", "-m", "feature"]);
        let feature_sha = git(origin, &["rev-parse", "HEAD"]).trim().to_string();
        git(origin, &["checkout", &initial_branch]);

        (origin_dir, base_sha, feature_sha)
    }

    #[test]
    fn merge_applies_cleanly_for_non_conflicting_change() {
        let (origin_dir, base_sha, feature_sha) = init_bare_origin_with_branches();
        // Clone directly from the origin path; `Git2RepoTool` only adds URL
        // templating on top of this same `RepoBuilder::clone` call.
        let dir = TempDir::new().unwrap();
        let repo = RepoBuilder::new()
            .clone(origin_dir.path().to_str().unwrap(), dir.path())
            .expect("clone origin");
        let workspace = Workspace { _dir: dir, repo };
        workspace.configure_dummy_identity().unwrap();
        workspace.checkout(&base_sha).unwrap();
        let applied = workspace.merge(&feature_sha).unwrap();
        assert!(applied);
    }

    #[test]
    fn clone_url_substitutes_org_and_repo() {
        let tool = Git2RepoTool::new("https://example.com/{org}/{repo}.git");
        assert_eq!(tool.clone_url("acme", "widgets"), "https://example.com/acme/widgets.git");
    }
}
