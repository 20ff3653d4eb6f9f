use futures::future::try_join_all;
use std::path::Path;
use storyreel_core::timing::PageDurations;
use storyreel_core::types::{Page, TimeUs};
use tracing::debug;

use crate::error::{RenderError, Result};
use crate::storage::MediaStorage;

/// On-screen duration of every page, in the order given.
///
/// Pages with a finished narration clip last as long as the clip; others get
/// `fallback`. Probes run concurrently. A failed probe fails the whole call.
pub async fn resolve_all(
    storage: &dyn MediaStorage,
    pages: &[&Page],
    fallback: TimeUs,
) -> Result<PageDurations> {
    let probes = pages.iter().map(|page| async move {
        match page.ready_speech() {
            Some(speech) => probe_duration(storage, &speech.path, page.page_number).await,
            None => Ok(fallback),
        }
    });
    Ok(PageDurations(try_join_all(probes).await?))
}

async fn probe_duration(storage: &dyn MediaStorage, path: &Path, page: u32) -> Result<TimeUs> {
    let probe = storage
        .probe(path)
        .await
        .map_err(|e| RenderError::ProbeFailed {
            path: path.to_path_buf(),
            reason: format!("{e:#}"),
        })?;
    debug!(page, duration = %probe.duration, "probed narration");
    Ok(probe.duration)
}
