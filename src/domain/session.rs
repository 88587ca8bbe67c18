use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Source image shared by every indexed request until a DONE signal.
#[derive(Debug, Default)]
pub struct Session {
    source: Mutex<Option<PathBuf>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn source(&self) -> Option<PathBuf> {
        self.source.lock().await.clone()
    }

    /// Keep the first source of the session. Returns the source in effect
    /// and whether `candidate` was adopted.
    pub async fn adopt(&self, candidate: &Path) -> (PathBuf, bool) {
        let mut source = self.source.lock().await;
        match source.as_ref() {
            Some(existing) => (existing.clone(), false),
            None => {
                *source = Some(candidate.to_path_buf());
                (candidate.to_path_buf(), true)
            }
        }
    }

    /// Like [`Session::adopt`], but `place` moves the candidate into place
    /// while the session is locked. It only runs when no source is set, so
    /// concurrent first uploads never both land on disk.
    pub async fn adopt_with<F, Fut, E>(&self, place: F) -> Result<(PathBuf, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<PathBuf, E>>,
    {
        let mut source = self.source.lock().await;
        if let Some(existing) = source.as_ref() {
            return Ok((existing.clone(), false));
        }
        let placed = place().await?;
        *source = Some(placed.clone());
        Ok((placed, true))
    }

    /// End the session, returning the source image it held.
    pub async fn reset(&self) -> Option<PathBuf> {
        self.source.lock().await.take()
    }
}
