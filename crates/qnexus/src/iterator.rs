//! Lazy iteration over paginated list endpoints.
//!
//! A [`NexusIterator`] walks a JSON:API collection one page at a time.
//! Pages are fetched on demand through a [`PageSource`] and decoded by a
//! per-resource function into typed items.
//!
//! ```ignore
//! let mut projects = client.projects().get_all(Filter::new().name_like("vqe"));
//! println!("{} matches", projects.count().await?);
//! while let Some(project) = projects.next().await? {
//!     println!("{}", project.annotations.display_name());
//! }
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, Stream};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{NexusError, NexusResult};
use crate::filters::QueryParams;
use crate::models::references::data_entries;

/// Query key carrying the page index.
pub const PAGE_NUMBER: &str = "page[number]";

/// Transport for page and count requests.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one page of `path` with the given query.
    async fn fetch_page(&self, path: &str, params: &QueryParams) -> NexusResult<Value>;

    /// Count the items of `path` matching the query.
    async fn fetch_count(&self, path: &str, params: &QueryParams) -> NexusResult<u64>;
}

/// Decodes one page document into items.
pub type PageDecoder<T> = fn(&Value) -> NexusResult<Vec<T>>;

/// Paginated, cached iterator over a remote collection.
pub struct NexusIterator<T> {
    source: Arc<dyn PageSource>,
    resource_type: String,
    path: String,
    params: QueryParams,
    decode: PageDecoder<T>,
    start_page: u32,
    current_page: u32,
    buffer: VecDeque<T>,
    exhausted: bool,
    cached: Option<Vec<T>>,
}

impl<T> std::fmt::Debug for NexusIterator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NexusIterator")
            .field("resource_type", &self.resource_type)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("current_page", &self.current_page)
            .field("buffered", &self.buffer.len())
            .field("exhausted", &self.exhausted)
            .field("cached", &self.cached.as_ref().map(Vec::len))
            .finish()
    }
}

impl<T> NexusIterator<T> {
    /// Create an iterator over `path`.
    ///
    /// Iteration starts at the `page[number]` given in `params`, or page 0.
    pub fn new(
        source: Arc<dyn PageSource>,
        resource_type: impl Into<String>,
        path: impl Into<String>,
        params: QueryParams,
        decode: PageDecoder<T>,
    ) -> Self {
        let start_page = params
            .iter()
            .find(|(k, _)| k == PAGE_NUMBER)
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);

        Self {
            source,
            resource_type: resource_type.into(),
            path: path.into(),
            params,
            decode,
            start_page,
            current_page: start_page,
            buffer: VecDeque::new(),
            exhausted: false,
            cached: None,
        }
    }

    /// Resource name used in errors and summaries.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Current query parameters.
    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    /// Next item, fetching a page if the buffer is empty.
    ///
    /// Returns `Ok(None)` once an empty page or the last page has been consumed.
    pub async fn next(&mut self) -> NexusResult<Option<T>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }
            if self.exhausted {
                return Ok(None);
            }
            self.fetch_next_page().await?;
        }
    }

    async fn fetch_next_page(&mut self) -> NexusResult<()> {
        let page_number = self.current_page;
        set_param(&mut self.params, PAGE_NUMBER, page_number.to_string());

        debug!(
            resource = %self.resource_type,
            page = page_number,
            "Fetching page"
        );
        let page = self.source.fetch_page(&self.path, &self.params).await?;

        if data_entries(&page).is_empty() {
            trace!(page = page_number, "Empty page, iteration finished");
            self.current_page += 1;
            self.exhausted = true;
            return Ok(());
        }

        // A page that fails to decode is fetched again on the next call.
        let items = (self.decode)(&page)?;
        self.current_page += 1;
        if is_last_page(&page, page_number) {
            trace!(page = page_number, "Last page reached");
            self.exhausted = true;
        }
        self.buffer.extend(items);
        Ok(())
    }

    /// All remaining items, cached after the first call.
    pub async fn list(&mut self) -> NexusResult<&[T]> {
        if self.cached.is_none() {
            let mut items = Vec::new();
            while let Some(item) = self.next().await? {
                items.push(item);
            }
            debug!(
                resource = %self.resource_type,
                count = items.len(),
                "Collected items"
            );
            self.cached = Some(items);
        }
        Ok(self.cached.as_deref().unwrap_or_default())
    }

    /// Consume the iterator and return every remaining item.
    pub async fn into_list(mut self) -> NexusResult<Vec<T>> {
        self.list().await?;
        Ok(self.cached.take().unwrap_or_default())
    }

    /// Drop cached state and rewind to the starting page.
    pub fn refresh(&mut self) {
        self.current_page = self.start_page;
        self.buffer.clear();
        self.exhausted = false;
        self.cached = None;
    }

    /// Number of matching items, from the dedicated count endpoint.
    ///
    /// Does not affect iteration or the cache.
    pub async fn count(&self) -> NexusResult<u64> {
        let params: QueryParams = self
            .params
            .iter()
            .filter(|(k, _)| !k.starts_with("page["))
            .cloned()
            .collect();
        self.source.fetch_count(&self.path, &params).await
    }

    /// Resource name and total count.
    pub async fn summarize(&self) -> NexusResult<(String, u64)> {
        Ok((self.resource_type.clone(), self.count().await?))
    }

    /// The single item matching the filters.
    ///
    /// Fails with [`NexusError::ZeroMatches`] or [`NexusError::NoUniqueMatch`]
    /// when the count is not exactly one.
    pub async fn try_unique_match(&mut self) -> NexusResult<T>
    where
        T: Clone,
    {
        match self.count().await? {
            0 => Err(NexusError::ZeroMatches(self.resource_type.clone())),
            1 => self
                .list()
                .await?
                .first()
                .cloned()
                .ok_or_else(|| NexusError::ZeroMatches(self.resource_type.clone())),
            count => Err(NexusError::NoUniqueMatch {
                resource: self.resource_type.clone(),
                count,
            }),
        }
    }

    /// Adapt into a [`Stream`] of items.
    pub fn into_stream(self) -> impl Stream<Item = NexusResult<T>> {
        stream::unfold(Some(self), |state| async move {
            let mut iter = state?;
            match iter.next().await {
                Ok(Some(item)) => Some((Ok(item), Some(iter))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

fn set_param(params: &mut QueryParams, key: &str, value: String) {
    match params.iter_mut().find(|(k, _)| k == key) {
        Some(entry) => entry.1 = value,
        None => params.push((key.to_string(), value)),
    }
}

/// Whether `meta.total_pages` says `page_number` is the final page.
fn is_last_page(page: &Value, page_number: u32) -> bool {
    page.pointer("/meta/total_pages")
        .and_then(Value::as_u64)
        .is_some_and(|total| u64::from(page_number) + 1 >= total)
}
