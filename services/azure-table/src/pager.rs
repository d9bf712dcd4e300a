use std::future::Future;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use http::HeaderMap;
use tablestore_core::{Error, Result};

/// A lazily fetched sequence of results.
///
/// Pages are requested only while the stream is polled. Dropping it stops
/// further continuation requests.
pub type ResultStream<T> = BoxStream<'static, Result<T>>;

/// Server issued marker telling where the next page starts.
///
/// It is sent back as query parameters, so a listing can be resumed from any
/// page with `*_page` methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Continuation {
    pairs: Vec<(String, String)>,
}

impl Continuation {
    /// Read continuation headers from a response, mapping each header to the
    /// query key it is sent back as.
    pub(crate) fn from_headers(headers: &HeaderMap, keys: &[(&str, &str)]) -> Option<Self> {
        let pairs: Vec<_> = keys
            .iter()
            .filter_map(|(header, key)| {
                let value = headers.get(*header)?.to_str().ok()?;
                (!value.is_empty()).then(|| (key.to_string(), value.to_string()))
            })
            .collect();

        (!pairs.is_empty()).then_some(Self { pairs })
    }

    /// Query parameters to send with the next request.
    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Items of this page, possibly none.
    pub items: Vec<T>,
    /// Marker of the next page, `None` on the last one.
    pub continuation: Option<Continuation>,
}

/// Flatten pages returned by `fetch` into a stream of items.
///
/// `fetch` is called with `None` for the first page, then with each
/// continuation until a page comes back without one.
pub(crate) fn paginate<T, F, Fut>(fetch: F) -> ResultStream<T>
where
    T: Send + 'static,
    F: FnMut(Option<Continuation>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Page<T>>> + Send + 'static,
{
    // `None` once the last page has been read.
    let start: Option<Option<Continuation>> = Some(None);

    stream::try_unfold((fetch, start), |(mut fetch, next)| async move {
        let Some(continuation) = next else {
            return Ok::<_, Error>(None);
        };
        let page = fetch(continuation).await?;
        let next = page.continuation.map(Some);
        Ok(Some((page.items, (fetch, next))))
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
    .try_flatten()
    .boxed()
}
