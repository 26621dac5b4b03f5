//! Git-backed publisher.
//!
//! Uses the git2 crate; every call opens the repository fresh, so the
//! publisher itself holds no libgit2 handles and is cheap to clone.

use crate::{GitError, GitResult, PublishOutcome, Publisher};
use async_trait::async_trait;
use git2::{Cred, CredentialType, ErrorCode, RemoteCallbacks, Repository, Signature, StatusOptions};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::path::{Component, PathBuf};
use tracing::{debug, info};

/// Credential callbacks give up after this many attempts instead of letting
/// libgit2 retry forever with the same rejected credentials.
const MAX_CREDENTIAL_ATTEMPTS: u32 = 3;

pub const DEFAULT_AUTHOR_NAME: &str = "git";
pub const DEFAULT_AUTHOR_EMAIL: &str = "consuldiff@consuldiff.com";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Consul KV Diff Update";

/// Where and as whom to publish.
#[derive(Clone)]
pub struct GitSettings {
    /// Working tree holding the snapshot files.
    pub repo_path: PathBuf,
    /// Remote to clone from and push to. Without one, history stays local.
    pub remote_url: Option<String>,
    pub remote_name: String,
    pub author_name: String,
    pub author_email: String,
    /// Password/token for HTTP remotes.
    pub token: Option<String>,
    pub message: String,
}

impl GitSettings {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
            remote_url: None,
            remote_name: "origin".to_string(),
            author_name: DEFAULT_AUTHOR_NAME.to_string(),
            author_email: DEFAULT_AUTHOR_EMAIL.to_string(),
            token: None,
            message: DEFAULT_COMMIT_MESSAGE.to_string(),
        }
    }

    pub fn with_remote(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl fmt::Debug for GitSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitSettings")
            .field("repo_path", &self.repo_path)
            .field("remote_url", &self.remote_url)
            .field("remote_name", &self.remote_name)
            .field("author_name", &self.author_name)
            .field("author_email", &self.author_email)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("message", &self.message)
            .finish()
    }
}

/// Build remote callbacks that answer credential requests from the settings.
fn remote_callbacks<'a>(settings: &'a GitSettings, attempts: &'a Cell<u32>) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, allowed_types| {
        attempts.set(attempts.get() + 1);
        if attempts.get() > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("authentication failed"));
        }
        let username = username_from_url.unwrap_or(settings.author_name.as_str());

        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(token) = &settings.token {
                return Cred::userpass_plaintext(username, token);
            }
        }
        if allowed_types.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
        }
        Cred::default()
    });
    callbacks
}

/// Publishes snapshot files by committing them and pushing the branch.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    settings: GitSettings,
}

impl GitPublisher {
    /// Prepare the repository at `settings.repo_path`.
    ///
    /// An existing repository is opened (and given the configured remote if
    /// it lacks one). Otherwise the remote is cloned into the path, or a new
    /// repository is initialized when no remote is configured.
    pub fn setup(settings: GitSettings) -> GitResult<Self> {
        let repo_path = &settings.repo_path;

        if repo_path.join(".git").exists() {
            info!(path = %repo_path.display(), "Opening existing repository");
            let repo = Repository::open(repo_path)?;
            if let Some(url) = &settings.remote_url {
                match repo.find_remote(&settings.remote_name) {
                    Ok(_) => {}
                    Err(e) if e.code() == ErrorCode::NotFound => {
                        info!(remote = %settings.remote_name, "Adding remote to existing repository");
                        repo.remote(&settings.remote_name, url)?;
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        } else if let Some(url) = &settings.remote_url {
            info!(url = %url, path = %repo_path.display(), "Cloning repository");
            let attempts = Cell::new(0);
            let mut fetch_opts = git2::FetchOptions::new();
            fetch_opts.remote_callbacks(remote_callbacks(&settings, &attempts));
            git2::build::RepoBuilder::new()
                .fetch_options(fetch_opts)
                .clone(url, repo_path)?;
        } else {
            info!(path = %repo_path.display(), "Initializing new repository");
            Repository::init(repo_path)?;
        }

        Ok(Self { settings })
    }

    /// [`GitPublisher::setup`] on the blocking thread pool.
    pub async fn connect(settings: GitSettings) -> GitResult<Self> {
        tokio::task::spawn_blocking(move || Self::setup(settings))
            .await
            .map_err(|e| GitError::Task(e.to_string()))?
    }

    pub fn settings(&self) -> &GitSettings {
        &self.settings
    }

    fn open_repo(&self) -> GitResult<Repository> {
        Ok(Repository::open(&self.settings.repo_path)?)
    }

    /// Stage files, commit if anything changed, then push.
    pub fn publish_blocking(&self, paths: &[PathBuf]) -> GitResult<PublishOutcome> {
        let repo = self.open_repo()?;
        self.stage(&repo, paths)?;

        let commit = if has_staged_changes(&repo)? {
            let id = self.commit(&repo)?;
            info!(commit = %id, files = paths.len(), "Committed snapshot files");
            Some(id)
        } else {
            debug!("Snapshot files unchanged, nothing to commit");
            None
        };

        let pushed = self.push(&repo)?;
        Ok(PublishOutcome { commit, pushed })
    }

    /// Stage files relative to the repository root.
    fn stage(&self, repo: &Repository, paths: &[PathBuf]) -> GitResult<()> {
        let mut index = repo.index()?;

        for path in paths {
            if path
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
            {
                return Err(GitError::Path(format!(
                    "Path '{}' is outside repository",
                    path.display()
                )));
            }

            if self.settings.repo_path.join(path).exists() {
                index.add_path(path)?;
            } else {
                index.remove_path(path)?;
            }
        }

        index.write()?;
        Ok(())
    }

    fn commit(&self, repo: &Repository) -> GitResult<String> {
        let sig = Signature::now(&self.settings.author_name, &self.settings.author_email)?;
        let mut index = repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;

        // Get parent commit (if not initial commit)
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit()?],
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                vec![]
            }
            Err(e) => return Err(e.into()),
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

        let commit_id = repo.commit(
            Some("HEAD"),
            &sig,
            &sig,
            &self.settings.message,
            &tree,
            &parent_refs,
        )?;

        Ok(commit_id.to_string().chars().take(7).collect())
    }

    /// Push the current branch. Returns whether a push was attempted.
    fn push(&self, repo: &Repository) -> GitResult<bool> {
        if self.settings.remote_url.is_none() {
            return Ok(false);
        }

        let branch = match repo.head() {
            Ok(head) => head
                .shorthand()
                .map(str::to_string)
                .ok_or_else(|| GitError::Path("Cannot determine current branch".to_string()))?,
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                debug!("No commits yet, nothing to push");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        let mut remote = repo.find_remote(&self.settings.remote_name)?;
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");

        let attempts = Cell::new(0);
        let rejected: RefCell<Option<(String, String)>> = RefCell::new(None);
        let mut callbacks = remote_callbacks(&self.settings, &attempts);
        callbacks.push_update_reference(|reference, status| {
            if let Some(message) = status {
                *rejected.borrow_mut() = Some((reference.to_string(), message.to_string()));
            }
            Ok(())
        });

        let mut push_opts = git2::PushOptions::new();
        push_opts.remote_callbacks(callbacks);
        remote.push(&[refspec.as_str()], Some(&mut push_opts))?;
        drop(push_opts);

        if let Some((reference, message)) = rejected.into_inner() {
            return Err(GitError::PushRejected { reference, message });
        }

        debug!(remote = %self.settings.remote_name, branch = %branch, "Pushed snapshot history");
        Ok(true)
    }
}

/// Whether the index differs from HEAD.
fn has_staged_changes(repo: &Repository) -> GitResult<bool> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(false).include_ignored(false);

    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(statuses.iter().any(|s| {
        let status = s.status();
        status.is_index_new()
            || status.is_index_modified()
            || status.is_index_deleted()
            || status.is_index_renamed()
    }))
}

#[async_trait]
impl Publisher for GitPublisher {
    async fn publish(&self, paths: &[PathBuf]) -> GitResult<PublishOutcome> {
        let publisher = self.clone();
        let paths = paths.to_vec();
        tokio::task::spawn_blocking(move || publisher.publish_blocking(&paths))
            .await
            .map_err(|e| GitError::Task(e.to_string()))?
    }
}
