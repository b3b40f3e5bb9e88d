//! In-memory repository service for testing
//!
//! Models just enough of a hosted git service to run real rebases: trees
//! are flat file maps, commits and refs live in hash maps, and remote merges
//! are three-way merges over file contents.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use pr_rebaser::error::{Error, Result};
use pr_rebaser::platform::{RemoteRepository, heads_ref};
use pr_rebaser::types::{
    CommitRecord, Comparison, MergeMethod, MergeOutcome, NewCommit, PrState, PullRequestDetails,
    RepoConfig, Signature,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

/// Flat snapshot of a tree: path to content
pub type Files = BTreeMap<String, String>;

/// Call record for `update_ref`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRefCall {
    pub name: String,
    pub sha: String,
    pub force: bool,
}

/// Call record for `merge_branches`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCall {
    pub base: String,
    pub head: String,
}

/// Call record for `merge_pull_request`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePrCall {
    pub pr_number: u64,
    pub method: MergeMethod,
}

#[derive(Default)]
struct Store {
    trees: HashMap<String, Files>,
    commits: HashMap<String, CommitRecord>,
    refs: HashMap<String, String>,
    pull_requests: BTreeMap<u64, PullRequestDetails>,
    required_statuses: HashMap<String, Vec<String>>,
}

/// Mock repository service
///
/// Features:
/// - Real object model (commits, trees, refs) with three-way merges
/// - PR heads follow their branch refs
/// - Call tracking for every mutating primitive
/// - Error injection and a hook that moves a branch mid-rebase
pub struct MockRepository {
    config: RepoConfig,
    next_id: AtomicU64,
    store: Mutex<Store>,
    // Call tracking
    created_refs: Mutex<Vec<String>>,
    deleted_refs: Mutex<Vec<String>>,
    update_ref_calls: Mutex<Vec<UpdateRefCall>>,
    created_commits: Mutex<Vec<NewCommit>>,
    merge_calls: Mutex<Vec<MergeCall>>,
    merge_pr_calls: Mutex<Vec<MergePrCall>>,
    get_pr_calls: Mutex<Vec<u64>>,
    // Error injection
    get_pr_failures: AtomicU32,
    error_on_compare: Mutex<Option<String>>,
    error_on_required_statuses: Mutex<Option<String>>,
    commit_listing_cap: Mutex<Option<usize>>,
    // Behaviour hooks
    move_on_merge: Mutex<Option<(String, String)>>,
    merge_delay: Mutex<Option<Duration>>,
}

/// Fixed signature used for all commits created by tests
pub fn signature() -> Signature {
    Signature {
        name: "Test User".to_string(),
        email: "test@example.com".to_string(),
        date: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
    }
}

impl MockRepository {
    /// Create an empty repository `owner/repo`
    pub fn new(owner: &str, repo: &str) -> Self {
        let mut store = Store::default();
        store.trees.insert("tree-empty".to_string(), Files::new());

        Self {
            config: RepoConfig {
                owner: owner.to_string(),
                repo: repo.to_string(),
                host: None,
            },
            next_id: AtomicU64::new(1),
            store: Mutex::new(store),
            created_refs: Mutex::new(Vec::new()),
            deleted_refs: Mutex::new(Vec::new()),
            update_ref_calls: Mutex::new(Vec::new()),
            created_commits: Mutex::new(Vec::new()),
            merge_calls: Mutex::new(Vec::new()),
            merge_pr_calls: Mutex::new(Vec::new()),
            get_pr_calls: Mutex::new(Vec::new()),
            get_pr_failures: AtomicU32::new(0),
            error_on_compare: Mutex::new(None),
            error_on_required_statuses: Mutex::new(None),
            commit_listing_cap: Mutex::new(None),
            move_on_merge: Mutex::new(None),
            merge_delay: Mutex::new(None),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn store_tree(&self, store: &mut Store, files: Files) -> String {
        let id = self.next_id("tree");
        store.trees.insert(id.clone(), files);
        id
    }

    fn store_commit(&self, store: &mut Store, commit: &NewCommit) -> String {
        let sha = self.next_id("commit");
        store.commits.insert(
            sha.clone(),
            CommitRecord {
                sha: sha.clone(),
                tree: commit.tree.clone(),
                parents: commit.parents.clone(),
                author: commit.author.clone(),
                committer: commit.committer.clone(),
                message: commit.message.clone(),
            },
        );
        sha
    }

    // === Setup methods ===

    /// Create a commit applying `changes` on top of `parent` (or an empty tree)
    ///
    /// An empty content deletes the file.
    pub fn commit(&self, parent: Option<&str>, changes: &[(&str, &str)], message: &str) -> String {
        let mut store = self.store.lock().unwrap();
        let mut files = parent
            .map(|p| {
                let tree = &store.commits[p].tree;
                store.trees[tree].clone()
            })
            .unwrap_or_default();
        for (path, content) in changes {
            if content.is_empty() {
                files.remove(*path);
            } else {
                files.insert((*path).to_string(), (*content).to_string());
            }
        }

        let tree = self.store_tree(&mut store, files);
        let commit = NewCommit {
            tree,
            parents: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
            author: signature(),
            committer: signature(),
            message: message.to_string(),
        };
        self.store_commit(&mut store, &commit)
    }

    /// Point a branch at a commit, creating it if needed
    pub fn set_branch(&self, branch: &str, sha: &str) {
        self.store
            .lock()
            .unwrap()
            .refs
            .insert(heads_ref(branch), sha.to_string());
    }

    /// Register a pull request; its head follows the branch ref
    pub fn add_pull_request(&self, pr: PullRequestDetails) {
        self.store
            .lock()
            .unwrap()
            .pull_requests
            .insert(pr.number, pr);
    }

    /// Change a stored pull request
    pub fn update_pull_request(&self, number: u64, f: impl FnOnce(&mut PullRequestDetails)) {
        let mut store = self.store.lock().unwrap();
        if let Some(pr) = store.pull_requests.get_mut(&number) {
            f(pr);
        }
    }

    /// Set the required status contexts for a base branch
    pub fn set_required_statuses(&self, branch: &str, contexts: &[&str]) {
        self.store.lock().unwrap().required_statuses.insert(
            branch.to_string(),
            contexts.iter().map(ToString::to_string).collect(),
        );
    }

    // === Error injection and hooks ===

    /// Make the next `count` calls to `get_pull_request` fail
    pub fn fail_get_pull_request_times(&self, count: u32) {
        self.get_pr_failures.store(count, Ordering::SeqCst);
    }

    /// Make `compare_commits` return an error
    pub fn fail_compare(&self, msg: &str) {
        *self.error_on_compare.lock().unwrap() = Some(msg.to_string());
    }

    /// Make `required_status_contexts` return an error
    pub fn fail_required_statuses(&self, msg: &str) {
        *self.error_on_required_statuses.lock().unwrap() = Some(msg.to_string());
    }

    /// List at most `cap` commits per PR, oldest first, like a capped API
    pub fn cap_commit_listing(&self, cap: usize) {
        *self.commit_listing_cap.lock().unwrap() = Some(cap);
    }

    /// Move `branch` to `sha` during the next remote merge
    pub fn move_branch_on_merge(&self, branch: &str, sha: &str) {
        *self.move_on_merge.lock().unwrap() = Some((heads_ref(branch), sha.to_string()));
    }

    /// Sleep in every remote merge, so concurrent attempts overlap
    pub fn set_merge_delay(&self, delay: Duration) {
        *self.merge_delay.lock().unwrap() = Some(delay);
    }

    // === Inspection methods ===

    /// Commit a branch points at
    pub fn branch_sha(&self, branch: &str) -> Option<String> {
        self.store.lock().unwrap().refs.get(&heads_ref(branch)).cloned()
    }

    /// All ref names currently present
    pub fn ref_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.store.lock().unwrap().refs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Read a stored commit
    pub fn commit_record(&self, sha: &str) -> CommitRecord {
        self.store.lock().unwrap().commits[sha].clone()
    }

    /// Files in a commit's tree
    pub fn files_at(&self, sha: &str) -> Files {
        let store = self.store.lock().unwrap();
        let tree = &store.commits[sha].tree;
        store.trees[tree].clone()
    }

    /// Commits from `sha` back to (excluding) `stop`, following first parents, oldest first
    pub fn first_parent_chain(&self, sha: &str, stop: &str) -> Vec<CommitRecord> {
        let store = self.store.lock().unwrap();
        let mut chain = Vec::new();
        let mut current = sha.to_string();
        while current != stop {
            let commit = store.commits[&current].clone();
            let Some(parent) = commit.parents.first().cloned() else {
                chain.push(commit);
                break;
            };
            chain.push(commit);
            current = parent;
        }
        chain.reverse();
        chain
    }

    pub fn get_created_refs(&self) -> Vec<String> {
        self.created_refs.lock().unwrap().clone()
    }

    pub fn get_deleted_refs(&self) -> Vec<String> {
        self.deleted_refs.lock().unwrap().clone()
    }

    pub fn get_update_ref_calls(&self) -> Vec<UpdateRefCall> {
        self.update_ref_calls.lock().unwrap().clone()
    }

    pub fn get_created_commits(&self) -> Vec<NewCommit> {
        self.created_commits.lock().unwrap().clone()
    }

    pub fn get_merge_calls(&self) -> Vec<MergeCall> {
        self.merge_calls.lock().unwrap().clone()
    }

    pub fn get_merge_pr_calls(&self) -> Vec<MergePrCall> {
        self.merge_pr_calls.lock().unwrap().clone()
    }

    pub fn get_pr_calls(&self) -> Vec<u64> {
        self.get_pr_calls.lock().unwrap().clone()
    }

    /// Number of mutating calls made so far
    pub fn mutation_count(&self) -> usize {
        self.created_refs.lock().unwrap().len()
            + self.deleted_refs.lock().unwrap().len()
            + self.update_ref_calls.lock().unwrap().len()
            + self.created_commits.lock().unwrap().len()
            + self.merge_calls.lock().unwrap().len()
    }

    /// Updates applied to a ref, in order
    pub fn updates_of(&self, name: &str) -> Vec<UpdateRefCall> {
        let name = heads_ref(name);
        self.get_update_ref_calls()
            .into_iter()
            .filter(|c| c.name == name)
            .collect()
    }

    pub fn assert_no_temporary_refs(&self) {
        let leftover: Vec<_> = self
            .ref_names()
            .into_iter()
            .filter(|name| name.starts_with("heads/tmp/"))
            .collect();
        assert!(leftover.is_empty(), "temporary refs left behind: {leftover:?}");
    }

    // === Object model helpers ===

    fn resolve(store: &Store, rev: &str) -> Result<String> {
        if let Some(sha) = store.refs.get(&heads_ref(rev)) {
            return Ok(sha.clone());
        }
        if store.commits.contains_key(rev) {
            return Ok(rev.to_string());
        }
        Err(Error::GitHubApi(format!("No commit found for {rev}")))
    }

    fn ancestors(store: &Store, sha: &str) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([sha.to_string()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(commit) = store.commits.get(&current) {
                queue.extend(commit.parents.iter().cloned());
            }
        }
        seen
    }

    fn merge_base(store: &Store, ours: &str, theirs: &str) -> Option<String> {
        let theirs_ancestors = Self::ancestors(store, theirs);
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([ours.to_string()]);
        while let Some(current) = queue.pop_front() {
            if theirs_ancestors.contains(&current) {
                return Some(current);
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(commit) = store.commits.get(&current) {
                queue.extend(commit.parents.iter().cloned());
            }
        }
        None
    }

    fn files_of(store: &Store, sha: &str) -> Files {
        store
            .commits
            .get(sha)
            .and_then(|c| store.trees.get(&c.tree))
            .cloned()
            .unwrap_or_default()
    }

    fn three_way(base: &Files, ours: &Files, theirs: &Files) -> Option<Files> {
        let paths: BTreeSet<&String> = base.keys().chain(ours.keys()).chain(theirs.keys()).collect();
        let mut merged = Files::new();
        for path in paths {
            let (b, o, t) = (base.get(path), ours.get(path), theirs.get(path));
            let resolved = if o == t {
                o
            } else if o == b {
                t
            } else if t == b {
                o
            } else {
                return None;
            };
            if let Some(content) = resolved {
                merged.insert(path.clone(), content.clone());
            }
        }
        Some(merged)
    }

    fn pr_view(store: &Store, pr: &PullRequestDetails) -> PullRequestDetails {
        let mut pr = pr.clone();
        if let Some(sha) = store.refs.get(&heads_ref(&pr.head_ref)) {
            pr.head_sha = sha.clone();
        }
        pr
    }
}

#[async_trait]
impl RemoteRepository for MockRepository {
    fn config(&self) -> &RepoConfig {
        &self.config
    }

    async fn get_ref(&self, name: &str) -> Result<String> {
        self.store
            .lock()
            .unwrap()
            .refs
            .get(&heads_ref(name))
            .cloned()
            .ok_or_else(|| Error::GitHubApi(format!("Not Found: {name}")))
    }

    async fn create_ref(&self, name: &str, sha: &str) -> Result<()> {
        self.created_refs.lock().unwrap().push(name.to_string());
        let mut store = self.store.lock().unwrap();
        let name = heads_ref(name);
        if store.refs.contains_key(&name) {
            return Err(Error::GitHubApi("Reference already exists".to_string()));
        }
        store.refs.insert(name, sha.to_string());
        Ok(())
    }

    async fn delete_ref(&self, name: &str) -> Result<()> {
        self.deleted_refs.lock().unwrap().push(name.to_string());
        self.store
            .lock()
            .unwrap()
            .refs
            .remove(&heads_ref(name))
            .map(|_| ())
            .ok_or_else(|| Error::GitHubApi("Reference does not exist".to_string()))
    }

    async fn update_ref(&self, name: &str, sha: &str, force: bool) -> Result<()> {
        self.update_ref_calls.lock().unwrap().push(UpdateRefCall {
            name: heads_ref(name),
            sha: sha.to_string(),
            force,
        });

        let mut store = self.store.lock().unwrap();
        let name = heads_ref(name);
        let Some(current) = store.refs.get(&name).cloned() else {
            return Err(Error::GitHubApi("Reference does not exist".to_string()));
        };
        if !force && !Self::ancestors(&store, sha).contains(&current) {
            return Err(Error::RefUpdateRejected {
                ref_name: name,
                sha: sha.to_string(),
                reason: "Update is not a fast forward".to_string(),
            });
        }
        store.refs.insert(name, sha.to_string());
        Ok(())
    }

    async fn get_commit(&self, sha: &str) -> Result<CommitRecord> {
        self.store
            .lock()
            .unwrap()
            .commits
            .get(sha)
            .cloned()
            .ok_or_else(|| Error::GitHubApi(format!("No commit found for SHA: {sha}")))
    }

    async fn create_commit(&self, commit: &NewCommit) -> Result<String> {
        self.created_commits.lock().unwrap().push(commit.clone());

        let mut store = self.store.lock().unwrap();
        if !store.trees.contains_key(&commit.tree) {
            return Err(Error::GitHubApi(format!("Tree not found: {}", commit.tree)));
        }
        if let Some(missing) = commit.parents.iter().find(|p| !store.commits.contains_key(*p)) {
            return Err(Error::GitHubApi(format!("Parent not found: {missing}")));
        }
        Ok(self.store_commit(&mut store, commit))
    }

    async fn merge_branches(&self, base: &str, head: &str, message: &str) -> Result<MergeOutcome> {
        self.merge_calls.lock().unwrap().push(MergeCall {
            base: base.to_string(),
            head: head.to_string(),
        });

        let delay = *self.merge_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut store = self.store.lock().unwrap();
        if let Some((branch, sha)) = self.move_on_merge.lock().unwrap().take() {
            store.refs.insert(branch, sha);
        }

        let base_ref = heads_ref(base);
        let Some(ours) = store.refs.get(&base_ref).cloned() else {
            return Err(Error::GitHubApi(format!("Base does not exist: {base}")));
        };
        let theirs = Self::resolve(&store, head)?;

        if Self::ancestors(&store, &ours).contains(&theirs) {
            return Ok(MergeOutcome::NothingToMerge);
        }

        let base_files = Self::merge_base(&store, &ours, &theirs)
            .map(|sha| Self::files_of(&store, &sha))
            .unwrap_or_default();
        let merged = Self::three_way(
            &base_files,
            &Self::files_of(&store, &ours),
            &Self::files_of(&store, &theirs),
        )
        .ok_or_else(|| Error::MergeConflict {
            base: base.to_string(),
            head: head.to_string(),
        })?;

        let tree = self.store_tree(&mut store, merged);
        let commit = NewCommit {
            tree: tree.clone(),
            parents: vec![ours, theirs],
            author: signature(),
            committer: signature(),
            message: message.to_string(),
        };
        let sha = self.store_commit(&mut store, &commit);
        store.refs.insert(base_ref, sha.clone());

        Ok(MergeOutcome::Merged { sha, tree })
    }

    async fn compare_commits(&self, base: &str, head: &str) -> Result<Comparison> {
        if let Some(msg) = self.error_on_compare.lock().unwrap().clone() {
            return Err(Error::GitHubApi(msg));
        }

        let store = self.store.lock().unwrap();
        let base_sha = Self::resolve(&store, base)?;
        let head_sha = Self::resolve(&store, head)?;
        let base_ancestors = Self::ancestors(&store, &base_sha);
        let head_ancestors = Self::ancestors(&store, &head_sha);

        Ok(Comparison {
            ahead_by: head_ancestors.difference(&base_ancestors).count() as u64,
            behind_by: base_ancestors.difference(&head_ancestors).count() as u64,
        })
    }

    async fn get_pull_request(&self, number: u64) -> Result<PullRequestDetails> {
        self.get_pr_calls.lock().unwrap().push(number);

        let failing = self
            .get_pr_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(Error::GitHubApi("Server Error".to_string()));
        }

        let store = self.store.lock().unwrap();
        store
            .pull_requests
            .get(&number)
            .map(|pr| Self::pr_view(&store, pr))
            .ok_or_else(|| Error::GitHubApi(format!("PR #{number} not found")))
    }

    async fn list_pull_request_commits(&self, number: u64) -> Result<Vec<CommitRecord>> {
        let store = self.store.lock().unwrap();
        let pr = store
            .pull_requests
            .get(&number)
            .ok_or_else(|| Error::GitHubApi(format!("PR #{number} not found")))?;
        let head = Self::resolve(&store, &pr.head_ref)?;
        let base = Self::resolve(&store, &pr.base_ref)?;
        let base_ancestors = Self::ancestors(&store, &base);

        let mut commits = Vec::new();
        let mut current = Some(head);
        while let Some(sha) = current {
            if base_ancestors.contains(&sha) {
                break;
            }
            let commit = store.commits[&sha].clone();
            current = commit.parents.first().cloned();
            commits.push(commit);
        }
        commits.reverse();
        if let Some(cap) = *self.commit_listing_cap.lock().unwrap() {
            commits.truncate(cap);
        }
        Ok(commits)
    }

    async fn list_open_pull_requests(&self) -> Result<Vec<PullRequestDetails>> {
        let store = self.store.lock().unwrap();
        Ok(store
            .pull_requests
            .values()
            .filter(|pr| pr.state == PrState::Open)
            .map(|pr| Self::pr_view(&store, pr))
            .collect())
    }

    async fn required_status_contexts(&self, branch: &str) -> Result<Vec<String>> {
        if let Some(msg) = self.error_on_required_statuses.lock().unwrap().clone() {
            return Err(Error::GitHubApi(msg));
        }
        Ok(self
            .store
            .lock()
            .unwrap()
            .required_statuses
            .get(branch)
            .cloned()
            .unwrap_or_default())
    }

    async fn merge_pull_request(&self, number: u64, method: MergeMethod) -> Result<bool> {
        self.merge_pr_calls.lock().unwrap().push(MergePrCall {
            pr_number: number,
            method,
        });
        let mut store = self.store.lock().unwrap();
        match store.pull_requests.get_mut(&number) {
            Some(pr) => {
                pr.state = PrState::Merged;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Timestamp `minutes` after a fixed epoch, for ordering PRs by age
pub fn at_minute(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}
