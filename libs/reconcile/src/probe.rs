//! Paginated existence probing.
//!
//! The same probe guards create ("fail fast if an equivalent record already
//! exists") and delete ("fail if the record is already gone"), giving
//! exactly-once creation and graceful handling of absent records.

use std::future::Future;

use tracing::trace;

use crate::ApiError;

/// One page of a backend listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,

    /// Continuation token; `None` or empty on the last page.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A final page.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }

    /// A page followed by more.
    pub fn with_next(items: Vec<T>, next_token: impl Into<String>) -> Self {
        Self {
            items,
            next_token: Some(next_token.into()),
        }
    }

    fn continuation(&self) -> Option<String> {
        self.next_token.clone().filter(|t| !t.is_empty())
    }
}

/// The token for the page after one requested with `sent`. A listing that
/// hands back the token it was given would never end.
fn advance(sent: Option<&str>, next: Option<String>) -> Result<Option<String>, ApiError> {
    match next {
        Some(next) if sent == Some(next.as_str()) => Err(ApiError::internal(format!(
            "Listing returned continuation token {next} twice"
        ))),
        next => Ok(next),
    }
}

/// Pages through a listing and returns the first item matching `is_match`.
///
/// A not-found failure from the listing means the parent is gone, which is
/// reported as no match.
pub async fn find<T, F, Fut, P>(mut list_page: F, is_match: P) -> Result<Option<T>, ApiError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
    P: Fn(&T) -> bool,
{
    let mut token = None;
    let mut pages = 0u32;

    loop {
        let page = match list_page(token.clone()).await {
            Ok(page) => page,
            Err(err) if err.is_not_found() => {
                trace!(error = %err, "Parent not found while probing");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        pages += 1;

        let next = page.continuation();
        if let Some(item) = page.items.into_iter().find(|item| is_match(item)) {
            trace!(pages, "Probe matched");
            return Ok(Some(item));
        }

        match advance(token.as_deref(), next)? {
            Some(next) => token = Some(next),
            None => {
                trace!(pages, "Probe exhausted listing without a match");
                return Ok(None);
            }
        }
    }
}

/// Returns true if any page of the listing contains a matching item.
pub async fn exists<T, F, Fut, P>(list_page: F, is_match: P) -> Result<bool, ApiError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
    P: Fn(&T) -> bool,
{
    Ok(find(list_page, is_match).await?.is_some())
}

/// Drains every page of a listing.
pub async fn collect_all<T, F, Fut>(mut list_page: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let mut items = Vec::new();
    let mut token = None;

    loop {
        let page = list_page(token.clone()).await?;
        let next = page.continuation();
        items.extend(page.items);
        match advance(token.as_deref(), next)? {
            Some(next) => token = Some(next),
            None => return Ok(items),
        }
    }
}
