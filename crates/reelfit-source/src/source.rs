//! The clip source boundary and multi-page search.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use reelfit_models::CandidateClip;

use crate::error::SourceResult;

/// A provider of stock clips.
#[async_trait]
pub trait ClipSource: Send + Sync {
    /// One page of search results, in provider order.
    async fn search(&self, query: &str, page: u32, page_size: u32) -> SourceResult<Vec<CandidateClip>>;

    /// Download `clip` to `dest`. On error nothing is left at `dest`.
    async fn download(&self, clip: &CandidateClip, dest: &Path) -> SourceResult<()>;
}

/// Fetch pages until `wanted` unique clips are collected, a page comes back
/// empty, or `max_pages` pages have been read.
pub async fn search_pages(
    source: &dyn ClipSource,
    query: &str,
    wanted: usize,
    page_size: u32,
    max_pages: u32,
) -> SourceResult<Vec<CandidateClip>> {
    let mut seen = HashSet::new();
    let mut clips = Vec::new();
    let mut pages = 0;

    for page in 1..=max_pages {
        if clips.len() >= wanted {
            break;
        }
        let results = source.search(query, page, page_size).await?;
        pages = page;
        debug!(query, page, results = results.len(), "Fetched search page");

        if results.is_empty() {
            break;
        }
        for clip in results {
            if seen.insert(clip.id.clone()) {
                clips.push(clip);
            }
        }
    }

    info!(query, pages, clips = clips.len(), wanted, "Search complete");
    Ok(clips)
}
