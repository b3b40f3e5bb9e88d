//! GitHub remote repository implementation

use crate::error::{Error, Result};
use crate::platform::{RemoteRepository, heads_ref};
use crate::types::{
    CommitRecord, Comparison, MergeMethod, MergeOutcome, MergeableState, NewCommit, PrState,
    PullRequestDetails, RepoConfig, Signature,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Page size for paginated listings (GitHub maximum)
const PER_PAGE: u8 = 100;

/// GitHub stops listing PR commits after this many
const MAX_PR_COMMITS: usize = 250;

#[derive(Deserialize)]
struct ShaRef {
    sha: String,
}

#[derive(Deserialize)]
struct GitRef {
    object: ShaRef,
}

#[derive(Deserialize)]
struct GitSignature {
    name: String,
    email: String,
    date: DateTime<Utc>,
}

impl From<GitSignature> for Signature {
    fn from(sig: GitSignature) -> Self {
        Self {
            name: sig.name,
            email: sig.email,
            date: sig.date,
        }
    }
}

/// Commit as returned by the Git data API
#[derive(Deserialize)]
struct GitCommit {
    sha: String,
    tree: ShaRef,
    parents: Vec<ShaRef>,
    author: GitSignature,
    committer: GitSignature,
    message: String,
}

impl From<GitCommit> for CommitRecord {
    fn from(commit: GitCommit) -> Self {
        Self {
            sha: commit.sha,
            tree: commit.tree.sha,
            parents: commit.parents.into_iter().map(|p| p.sha).collect(),
            author: commit.author.into(),
            committer: commit.committer.into(),
            message: commit.message,
        }
    }
}

/// Commit as returned by the pull request commits listing
#[derive(Deserialize)]
struct RepoCommit {
    sha: String,
    commit: RepoCommitInner,
    parents: Vec<ShaRef>,
}

#[derive(Deserialize)]
struct RepoCommitInner {
    tree: ShaRef,
    author: GitSignature,
    committer: GitSignature,
    message: String,
}

impl From<RepoCommit> for CommitRecord {
    fn from(commit: RepoCommit) -> Self {
        Self {
            sha: commit.sha,
            tree: commit.commit.tree.sha,
            parents: commit.parents.into_iter().map(|p| p.sha).collect(),
            author: commit.commit.author.into(),
            committer: commit.commit.committer.into(),
            message: commit.commit.message,
        }
    }
}

#[derive(Deserialize)]
struct MergeCommit {
    sha: String,
    commit: MergeCommitInner,
}

#[derive(Deserialize)]
struct MergeCommitInner {
    tree: ShaRef,
}

#[derive(Deserialize)]
struct CompareResponse {
    ahead_by: u64,
    behind_by: u64,
}

#[derive(Deserialize)]
struct RequiredStatusChecks {
    #[serde(default)]
    contexts: Vec<String>,
}

/// GitHub service using octocrab for pull requests and raw HTTP for Git data
pub struct GitHubService {
    client: Octocrab,
    config: RepoConfig,
    /// Token for raw HTTP requests
    token: String,
    /// HTTP client for raw requests (refs, commits, merges)
    http_client: Client,
    /// API host for raw requests
    api_host: String,
}

impl GitHubService {
    /// Create a new GitHub service
    pub fn new(token: &str, owner: String, repo: String, host: Option<String>) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.to_string());

        let api_host = if let Some(ref h) = host {
            let base_url = format!("https://{h}/api/v3");
            builder = builder
                .base_uri(&base_url)
                .map_err(|e| Error::GitHubApi(e.to_string()))?;
            format!("{h}/api/v3")
        } else {
            "api.github.com".to_string()
        };

        let client = builder
            .build()
            .map_err(|e| Error::GitHubApi(e.to_string()))?;

        let http_client = Client::builder()
            .user_agent("pr-rebaser")
            .build()
            .map_err(|e| Error::GitHubApi(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: RepoConfig { owner, repo, host },
            token: token.to_string(),
            http_client,
            api_host,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "https://{}/repos/{}/{}{}",
            self.api_host, self.config.owner, self.config.repo, path
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, self.api_url(path))
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// Send a request, turning non-success statuses into errors
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("{what} failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::GitHubApi(format!("{what} returned {status}: {body}")))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        self.send(request, what)
            .await?
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse {what} response: {e}")))
    }
}

/// Convert an octocrab PR into our `PullRequestDetails`
fn details_from_octocrab(pr: &octocrab::models::pulls::PullRequest) -> PullRequestDetails {
    let state = match pr.state {
        Some(octocrab::models::IssueState::Open) => PrState::Open,
        Some(octocrab::models::IssueState::Closed) if pr.merged_at.is_some() => PrState::Merged,
        // IssueState is non-exhaustive, so use wildcard for Closed and any future variants
        Some(_) | None => PrState::Closed,
    };

    let mergeable_state = match pr.mergeable_state {
        Some(octocrab::models::pulls::MergeableState::Clean) => MergeableState::Clean,
        Some(octocrab::models::pulls::MergeableState::Unstable) => MergeableState::Unstable,
        Some(octocrab::models::pulls::MergeableState::Dirty) => MergeableState::Dirty,
        Some(octocrab::models::pulls::MergeableState::Blocked) => MergeableState::Blocked,
        Some(octocrab::models::pulls::MergeableState::Behind) => MergeableState::Behind,
        Some(octocrab::models::pulls::MergeableState::Draft) => MergeableState::Draft,
        Some(octocrab::models::pulls::MergeableState::HasHooks) => MergeableState::HasHooks,
        Some(_) | None => MergeableState::Unknown,
    };

    // A missing head repository means the fork was deleted
    let head_repo = pr.head.repo.as_ref().and_then(|r| r.full_name.clone());
    let base_repo = pr.base.repo.as_ref().and_then(|r| r.full_name.clone());
    let head_is_fork = match (head_repo, base_repo) {
        (Some(head), Some(base)) => !head.eq_ignore_ascii_case(&base),
        _ => true,
    };

    PullRequestDetails {
        number: pr.number,
        title: pr.title.clone().unwrap_or_default(),
        state,
        is_draft: pr.draft.unwrap_or(false),
        mergeable: pr.mergeable,
        mergeable_state,
        head_ref: pr.head.ref_field.clone(),
        head_sha: pr.head.sha.clone(),
        head_is_fork,
        base_ref: pr.base.ref_field.clone(),
        labels: pr
            .labels
            .as_ref()
            .map(|labels| labels.iter().map(|l| l.name.clone()).collect())
            .unwrap_or_default(),
        created_at: pr.created_at.unwrap_or_default(),
        html_url: pr
            .html_url
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default(),
    }
}

#[async_trait]
impl RemoteRepository for GitHubService {
    fn config(&self) -> &RepoConfig {
        &self.config
    }

    async fn get_ref(&self, name: &str) -> Result<String> {
        let name = heads_ref(name);
        let git_ref: GitRef = self
            .send_json(
                self.request(Method::GET, &format!("/git/ref/{name}")),
                "get ref",
            )
            .await?;
        debug!(ref_name = %name, sha = %git_ref.object.sha, "got ref");
        Ok(git_ref.object.sha)
    }

    async fn create_ref(&self, name: &str, sha: &str) -> Result<()> {
        let name = heads_ref(name);
        debug!(ref_name = %name, sha, "creating ref");
        self.send(
            self.request(Method::POST, "/git/refs").json(&serde_json::json!({
                "ref": format!("refs/{name}"),
                "sha": sha,
            })),
            "create ref",
        )
        .await?;
        Ok(())
    }

    async fn delete_ref(&self, name: &str) -> Result<()> {
        let name = heads_ref(name);
        debug!(ref_name = %name, "deleting ref");
        self.send(
            self.request(Method::DELETE, &format!("/git/refs/{name}")),
            "delete ref",
        )
        .await?;
        Ok(())
    }

    async fn update_ref(&self, name: &str, sha: &str, force: bool) -> Result<()> {
        let name = heads_ref(name);
        debug!(ref_name = %name, sha, force, "updating ref");
        let response = self
            .request(Method::PATCH, &format!("/git/refs/{name}"))
            .json(&serde_json::json!({ "sha": sha, "force": force }))
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("update ref failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let reason = response.text().await.unwrap_or_default();
        if !force && status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(Error::RefUpdateRejected {
                ref_name: name,
                sha: sha.to_string(),
                reason,
            });
        }
        Err(Error::GitHubApi(format!(
            "update ref returned {status}: {reason}"
        )))
    }

    async fn get_commit(&self, sha: &str) -> Result<CommitRecord> {
        let commit: GitCommit = self
            .send_json(
                self.request(Method::GET, &format!("/git/commits/{sha}")),
                "get commit",
            )
            .await?;
        Ok(commit.into())
    }

    async fn create_commit(&self, commit: &NewCommit) -> Result<String> {
        let created: ShaRef = self
            .send_json(
                self.request(Method::POST, "/git/commits").json(commit),
                "create commit",
            )
            .await?;
        debug!(sha = %created.sha, parents = ?commit.parents, "created commit");
        Ok(created.sha)
    }

    async fn merge_branches(
        &self,
        base: &str,
        head: &str,
        message: &str,
    ) -> Result<MergeOutcome> {
        // The merges endpoint takes a bare branch name
        let branch = heads_ref(base);
        let branch = branch.trim_start_matches("heads/");
        debug!(base = %branch, head, "merging");

        let response = self
            .request(Method::POST, "/merges")
            .json(&serde_json::json!({
                "base": branch,
                "head": head,
                "commit_message": message,
            }))
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("merge failed: {e}")))?;

        match response.status() {
            StatusCode::CREATED => {
                let merge: MergeCommit = response.json().await.map_err(|e| {
                    Error::GitHubApi(format!("Failed to parse merge response: {e}"))
                })?;
                Ok(MergeOutcome::Merged {
                    sha: merge.sha,
                    tree: merge.commit.tree.sha,
                })
            }
            StatusCode::NO_CONTENT => Ok(MergeOutcome::NothingToMerge),
            StatusCode::CONFLICT => Err(Error::MergeConflict {
                base: branch.to_string(),
                head: head.to_string(),
            }),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::GitHubApi(format!("merge returned {status}: {body}")))
            }
        }
    }

    async fn compare_commits(&self, base: &str, head: &str) -> Result<Comparison> {
        let comparison: CompareResponse = self
            .send_json(
                self.request(Method::GET, &format!("/compare/{base}...{head}")),
                "compare commits",
            )
            .await?;
        debug!(
            base,
            head,
            ahead_by = comparison.ahead_by,
            behind_by = comparison.behind_by,
            "compared commits"
        );
        Ok(Comparison {
            ahead_by: comparison.ahead_by,
            behind_by: comparison.behind_by,
        })
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequestDetails> {
        debug!(pr_number = number, "getting PR details");
        let pr = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .get(number)
            .await?;

        let details = details_from_octocrab(&pr);
        debug!(pr_number = number, state = ?details.state, mergeable = ?details.mergeable, "got PR details");
        Ok(details)
    }

    async fn list_pull_request_commits(&self, number: u64) -> Result<Vec<CommitRecord>> {
        let mut commits = Vec::new();
        let mut page = 1u32;

        loop {
            let batch: Vec<RepoCommit> = self
                .send_json(
                    self.request(Method::GET, &format!("/pulls/{number}/commits"))
                        .query(&[("per_page", u32::from(PER_PAGE)), ("page", page)]),
                    "list PR commits",
                )
                .await?;

            let len = batch.len();
            commits.extend(batch.into_iter().map(CommitRecord::from));

            if commits.len() >= MAX_PR_COMMITS {
                return Err(Error::GitHubApi(format!(
                    "pull request #{number} has at least {MAX_PR_COMMITS} commits, the listing may be truncated"
                )));
            }
            if len < usize::from(PER_PAGE) {
                break;
            }
            page += 1;
        }

        debug!(pr_number = number, count = commits.len(), "listed PR commits");
        Ok(commits)
    }

    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequestDetails>> {
        let mut result = Vec::new();
        let mut page = 1u32;

        loop {
            let prs = self
                .client
                .pulls(&self.config.owner, &self.config.repo)
                .list()
                .state(octocrab::params::State::Open)
                .per_page(PER_PAGE)
                .page(page)
                .send()
                .await?;

            let has_next = prs.next.is_some();
            result.extend(prs.items.iter().map(details_from_octocrab));

            if !has_next {
                break;
            }
            page += 1;
        }

        debug!(count = result.len(), "listed open PRs");
        Ok(result)
    }

    async fn required_status_contexts(&self, branch: &str) -> Result<Vec<String>> {
        let path = format!(
            "/branches/{}/protection/required_status_checks",
            urlencoding::encode(branch)
        );
        let response = self
            .request(Method::GET, &path)
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to fetch required statuses: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(branch, "branch not protected, no required statuses");
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "required status checks returned {status}: {body}"
            )));
        }

        let checks: RequiredStatusChecks = response
            .json()
            .await
            .map_err(|e| Error::GitHubApi(format!("Failed to parse required statuses: {e}")))?;
        Ok(checks.contexts)
    }

    async fn merge_pull_request(&self, number: u64, method: MergeMethod) -> Result<bool> {
        debug!(pr_number = number, %method, "merging PR");

        let octocrab_method = match method {
            MergeMethod::Squash => octocrab::params::pulls::MergeMethod::Squash,
            MergeMethod::Merge => octocrab::params::pulls::MergeMethod::Merge,
            MergeMethod::Rebase => octocrab::params::pulls::MergeMethod::Rebase,
        };

        let result = self
            .client
            .pulls(&self.config.owner, &self.config.repo)
            .merge(number)
            .method(octocrab_method)
            .send()
            .await
            .map_err(|e| Error::GitHubApi(format!("Merge failed: {e}")))?;

        debug!(pr_number = number, merged = result.merged, sha = ?result.sha, "merge complete");
        Ok(result.merged)
    }
}
