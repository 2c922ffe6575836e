//! Paginator - iteration over a provider's "more pages" convention
//!
//! A paginator only enumerates pages; it does not cache and does not look
//! inside them. The dispatcher drives it to exhaustion before mapping, so an
//! output mapper always sees complete page data.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::HashSet;

#[async_trait]
pub trait Paginator: Send {
    type Page: Send;

    /// Whether another call to [`next_page`](Paginator::next_page) will yield a page
    fn has_more(&self) -> bool;

    async fn next_page(&mut self) -> anyhow::Result<Self::Page>;
}

pub type BoxPaginator<Page> = Box<dyn Paginator<Page = Page>>;

/// Drain a paginator, returning every page in order
pub async fn collect_pages<P>(paginator: &mut P) -> anyhow::Result<Vec<P::Page>>
where
    P: Paginator + ?Sized,
{
    let mut pages = Vec::new();
    while paginator.has_more() {
        pages.push(paginator.next_page().await?);
    }
    Ok(pages)
}

type PageFn<Page> = Box<dyn FnMut(Option<String>) -> BoxFuture<'static, anyhow::Result<(Page, Option<String>)>> + Send>;

/// Paginator for APIs that hand back a continuation token with each page
///
/// The fetch function receives the token of the previous page (`None` for
/// the first call) and returns the page plus the next token. An empty token
/// ends the iteration, as does a missing one. A token seen before is an error.
pub struct TokenPaginator<Page> {
    fetch: PageFn<Page>,
    next_token: Option<String>,
    seen_tokens: HashSet<String>,
    started: bool,
    pages_fetched: usize,
}

impl<Page: Send + 'static> TokenPaginator<Page> {
    pub fn new<F>(fetch: F) -> Self
    where
        F: FnMut(Option<String>) -> BoxFuture<'static, anyhow::Result<(Page, Option<String>)>> + Send + 'static,
    {
        Self {
            fetch: Box::new(fetch),
            next_token: None,
            seen_tokens: HashSet::new(),
            started: false,
            pages_fetched: 0,
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}

#[async_trait]
impl<Page: Send + 'static> Paginator for TokenPaginator<Page> {
    type Page = Page;

    fn has_more(&self) -> bool {
        !self.started || self.next_token.is_some()
    }

    async fn next_page(&mut self) -> anyhow::Result<Page> {
        if !self.has_more() {
            return Err(anyhow::anyhow!("no more pages"));
        }

        let token = self.next_token.take();
        self.started = true;

        if let Some(token) = &token {
            self.seen_tokens.insert(token.clone());
        }

        let (page, next) = (self.fetch)(token).await?;
        self.pages_fetched += 1;

        let next = next.filter(|t| !t.is_empty());
        if let Some(next) = &next {
            if self.seen_tokens.contains(next) {
                return Err(anyhow::anyhow!(
                    "provider returned page token {:?} twice after {} pages",
                    next,
                    self.pages_fetched
                ));
            }
        }
        self.next_token = next;

        Ok(page)
    }
}

/// Paginator over a call that returns everything in one response
pub struct SinglePage<Page> {
    fetch: Option<BoxFuture<'static, anyhow::Result<Page>>>,
}

impl<Page> SinglePage<Page> {
    pub fn new(fetch: BoxFuture<'static, anyhow::Result<Page>>) -> Self {
        Self { fetch: Some(fetch) }
    }
}

#[async_trait]
impl<Page: Send + 'static> Paginator for SinglePage<Page> {
    type Page = Page;

    fn has_more(&self) -> bool {
        self.fetch.is_some()
    }

    async fn next_page(&mut self) -> anyhow::Result<Page> {
        match self.fetch.take() {
            Some(fetch) => fetch.await,
            None => Err(anyhow::anyhow!("no more pages")),
        }
    }
}
