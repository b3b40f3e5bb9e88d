//! Shared test utilities

#![allow(dead_code)]

pub mod mock_repository;

pub use mock_repository::{MockRepository, at_minute};

use pr_rebaser::types::{MergeableState, PrState, PullRequestDetails};
use pr_rebaser::update::{
    LabelPolicy, PollSettings, SignalSet, UpdateConfig, UpdateCoordinator, UpdateState,
};
use std::sync::Arc;
use std::time::Duration;

/// Label used to whitelist PRs in tests
pub const KEEP_UP_TO_DATE: &str = "keep up to date";

/// Open, mergeable PR from `head` into `base`
///
/// `head_sha` is filled in by the mock from the branch ref.
pub fn make_pr(number: u64, head: &str, base: &str) -> PullRequestDetails {
    PullRequestDetails {
        number,
        title: format!("PR {number}"),
        state: PrState::Open,
        is_draft: false,
        mergeable: Some(true),
        mergeable_state: MergeableState::Clean,
        head_ref: head.to_string(),
        head_sha: String::new(),
        head_is_fork: false,
        base_ref: base.to_string(),
        labels: vec![KEEP_UP_TO_DATE.to_string()],
        created_at: at_minute(number as i64),
        html_url: format!("https://github.com/acme/widgets/pull/{number}"),
    }
}

/// Whitelist on the `keep up to date` label
pub fn whitelist_config() -> UpdateConfig {
    UpdateConfig {
        whitelist: SignalSet {
            labels: vec![KEEP_UP_TO_DATE.to_string()],
        },
        blacklist: SignalSet::default(),
    }
}

/// Fast poll settings for tests
pub fn fast_poll() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(5),
        max_ticks: 3,
    }
}

/// Coordinator using the label policy and fast polling
pub fn coordinator(repo: Arc<MockRepository>, state: Arc<UpdateState>) -> UpdateCoordinator {
    UpdateCoordinator::new(
        repo,
        Arc::new(LabelPolicy),
        state,
        whitelist_config(),
        fast_poll(),
    )
}

/// Repository `acme/widgets` with `main` and one PR branch behind it
///
/// History:
/// ```text
/// root -- m1            (main)
///    \
///     f1 -- f2 -- f3    (feature, PR #1)
/// ```
pub struct BehindFixture {
    pub repo: Arc<MockRepository>,
    pub root: String,
    pub main_tip: String,
    pub feature_commits: Vec<String>,
}

impl BehindFixture {
    pub fn new() -> Self {
        let repo = Arc::new(MockRepository::new("acme", "widgets"));
        let root = repo.commit(None, &[("README.md", "hello\n")], "initial");
        let main_tip = repo.commit(Some(&root), &[("base.txt", "base change\n")], "base work");
        let f1 = repo.commit(Some(&root), &[("a.txt", "a\n")], "add a");
        let f2 = repo.commit(Some(&f1), &[("b.txt", "b\n")], "add b");
        let f3 = repo.commit(Some(&f2), &[("a.txt", "a2\n")], "change a");

        repo.set_branch("main", &main_tip);
        repo.set_branch("feature", &f3);
        repo.add_pull_request(make_pr(1, "feature", "main"));

        Self {
            repo,
            root,
            main_tip,
            feature_commits: vec![f1, f2, f3],
        }
    }

    pub fn head(&self) -> &str {
        &self.feature_commits[2]
    }
}
