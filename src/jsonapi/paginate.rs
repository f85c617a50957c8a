// src/jsonapi/paginate.rs

//! Offset pagination over JSON:API collections.

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::decode::decode;
use super::document::Document;
use super::resolve::{IncludedTable, inline};
use crate::error::{AppError, Result};

/// Fetches one page of a collection.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, offset: usize, per_page: usize) -> Result<Document>;
}

/// Walk every page of a collection, yielding fully inlined resources in
/// server order.
///
/// Pages are fetched lazily: the next request is only issued once the
/// consumer has drained the current page. A failed fetch is yielded as an
/// `Err` and ends the stream.
pub fn paginate<'a, F>(fetcher: &'a F, per_page: usize) -> impl Stream<Item = Result<Value>> + Send + 'a
where
    F: PageFetcher + ?Sized,
{
    let per_page = per_page.max(1);

    stream::try_unfold(Some(0usize), move |cursor| async move {
        let Some(offset) = cursor else {
            return Ok(None);
        };

        let document = fetcher.fetch_page(offset, per_page).await?;
        let meta = document.page_meta();
        let Document { data, included, .. } = document;

        let table = IncludedTable::new(included);
        let items: Vec<Value> = data.iter().map(|r| inline(r, &table)).collect();

        log::debug!(
            "Fetched page at offset {} ({} of {} resources, {} included)",
            offset,
            meta.count,
            meta.total_count,
            table.len()
        );

        let next = if offset + meta.count < meta.total_count {
            if meta.count == 0 {
                return Err(AppError::Pagination {
                    offset,
                    message: format!(
                        "empty page before reaching total_count {}",
                        meta.total_count
                    ),
                });
            }
            Some(offset + per_page)
        } else {
            None
        };

        Ok::<_, AppError>(Some((items, next)))
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
    .try_flatten()
}

/// Like [`paginate`], decoding each inlined resource into `T`.
pub fn paginate_as<'a, T, F>(fetcher: &'a F, per_page: usize) -> impl Stream<Item = Result<T>> + Send + 'a
where
    T: DeserializeOwned + Send + 'a,
    F: PageFetcher + ?Sized,
{
    paginate(fetcher, per_page).map(|item| item.and_then(decode::<T>))
}
