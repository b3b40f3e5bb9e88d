//! Scratch branch used to stage a rebase

use crate::error::Result;
use crate::platform::{RemoteRepository, heads_ref};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Prefix of temporary branch names
const TMP_BRANCH_PREFIX: &str = "tmp/rebase-";

/// A uniquely named remote ref that lives for one rebase attempt
///
/// Call [`TemporaryRef::delete`] on every exit path. If the attempt future is
/// dropped before that (task cancelled mid-flight), the drop guard spawns
/// the deletion on the current tokio runtime.
pub struct TemporaryRef {
    repo: Arc<dyn RemoteRepository>,
    name: String,
    armed: bool,
}

impl TemporaryRef {
    /// Create a new temporary ref pointing at `sha`
    pub async fn create(repo: Arc<dyn RemoteRepository>, sha: &str) -> Result<Self> {
        let name = heads_ref(&format!("{TMP_BRANCH_PREFIX}{}", Uuid::new_v4()));
        repo.create_ref(&name, sha).await?;
        debug!(ref_name = %name, sha, "created temporary ref");

        Ok(Self {
            repo,
            name,
            armed: true,
        })
    }

    /// Ref name in `heads/<branch>` form
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delete the ref remotely
    ///
    /// Deletion failures are logged; the attempt outcome is not changed by them.
    pub async fn delete(mut self) {
        self.armed = false;
        match self.repo.delete_ref(&self.name).await {
            Ok(()) => debug!(ref_name = %self.name, "deleted temporary ref"),
            Err(e) => warn!(ref_name = %self.name, error = %e, "failed to delete temporary ref"),
        }
    }

    /// Whether a ref name was produced by this module
    pub fn is_temporary(name: &str) -> bool {
        heads_ref(name)
            .trim_start_matches("heads/")
            .starts_with(TMP_BRANCH_PREFIX)
    }
}

impl Drop for TemporaryRef {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let repo = Arc::clone(&self.repo);
        let name = std::mem::take(&mut self.name);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = repo.delete_ref(&name).await {
                        warn!(ref_name = %name, error = %e, "failed to delete abandoned temporary ref");
                    }
                });
            }
            Err(_) => warn!(ref_name = %name, "no runtime to delete abandoned temporary ref"),
        }
    }
}
