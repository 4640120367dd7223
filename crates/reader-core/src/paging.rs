use crate::model::Page;
use crate::observable::{Observable, Subscription};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

pub type PageFuture<'a, T> = Pin<Box<dyn Future<Output = anyhow::Result<Page<T>>> + Send + 'a>>;

pub trait PageFetcher<T>: Send + Sync {
    fn fetch(&self, page: u32) -> PageFuture<'_, T>;
}

impl<T, F> PageFetcher<T> for F
where
    F: Fn(u32) -> PageFuture<'static, T> + Send + Sync,
{
    fn fetch(&self, page: u32) -> PageFuture<'_, T> {
        self(page)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingState<T> {
    pub items: Vec<T>,
    pub next_page: u32,
    pub has_more: bool,
    pub loading: bool,
    pub loading_more: bool,
    pub error: Option<String>,
}

impl<T> PagingState<T> {
    fn initial(first_page: u32) -> Self {
        Self {
            items: Vec::new(),
            next_page: first_page,
            has_more: true,
            loading: false,
            loading_more: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed,
    /// The call was a no-op; no fetch was issued.
    Skipped,
    /// A fetch completed but its result no longer applies.
    Discarded,
}

/// List state machine driven by a page-fetch function.
///
/// State only changes inside `refresh` and `load_more`. A `load_more` that is
/// overtaken by a newer `refresh` drops its page. After `dispose` every
/// in-flight result is dropped and every subscription ends.
pub struct PagingEngine<T> {
    fetcher: Arc<dyn PageFetcher<T>>,
    first_page: u32,
    state: Observable<PagingState<T>>,
    generation: AtomicU64,
    disposed: AtomicBool,
}

impl<T> PagingEngine<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(first_page: u32, fetcher: impl PageFetcher<T> + 'static) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            first_page,
            state: Observable::new(PagingState::initial(first_page)),
            generation: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> PagingState<T> {
        self.state.get()
    }

    /// Snapshots announced from now on. Drop the handle to unsubscribe.
    pub fn subscribe(&self) -> Subscription<PagingState<T>> {
        self.state.subscribe()
    }

    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.state.close();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub async fn refresh(&self) -> LoadOutcome {
        if self.is_disposed() {
            return LoadOutcome::Skipped;
        }
        let started = self.state.update_if(|state| {
            if state.loading {
                return false;
            }
            state.loading = true;
            state.error = None;
            true
        });
        if !started {
            debug!("Refresh already in flight");
            return LoadOutcome::Skipped;
        }
        self.generation.fetch_add(1, Ordering::SeqCst);

        let result = self.fetcher.fetch(self.first_page).await;
        if self.is_disposed() {
            return LoadOutcome::Discarded;
        }
        match result {
            Ok(page) => {
                self.state.update_if(move |state| {
                    state.items = page.items;
                    state.next_page = page.next_page;
                    state.has_more = page.has_more;
                    state.loading = false;
                    true
                });
                LoadOutcome::Loaded
            }
            Err(err) => {
                let message = format!("{err:#}");
                self.state.update_if(move |state| {
                    state.error = Some(message);
                    state.loading = false;
                    true
                });
                LoadOutcome::Failed
            }
        }
    }

    pub async fn load_more(&self) -> LoadOutcome {
        if self.is_disposed() {
            return LoadOutcome::Skipped;
        }
        let mut page = self.first_page;
        let started = self.state.update_if(|state| {
            if state.loading_more || !state.has_more || state.loading {
                return false;
            }
            state.loading_more = true;
            state.error = None;
            page = state.next_page;
            true
        });
        if !started {
            return LoadOutcome::Skipped;
        }
        let generation = self.generation.load(Ordering::SeqCst);

        let result = self.fetcher.fetch(page).await;
        if self.is_disposed() {
            return LoadOutcome::Discarded;
        }
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!(page, "Dropping page overtaken by refresh");
            self.state.update_if(|state| {
                state.loading_more = false;
                true
            });
            return LoadOutcome::Discarded;
        }
        match result {
            Ok(next) => {
                self.state.update_if(move |state| {
                    state.items.extend(next.items);
                    state.next_page = next.next_page;
                    state.has_more = next.has_more;
                    state.loading_more = false;
                    true
                });
                LoadOutcome::Loaded
            }
            Err(err) => {
                let message = format!("{err:#}");
                self.state.update_if(move |state| {
                    state.error = Some(message);
                    state.loading_more = false;
                    true
                });
                LoadOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::{Notify, Semaphore};

    fn page(items: &[u32], next_page: u32, has_more: bool) -> Page<u32> {
        Page {
            items: items.to_vec(),
            next_page,
            has_more,
        }
    }

    struct Scripted {
        pages: Mutex<VecDeque<anyhow::Result<Page<u32>>>>,
        requested: Mutex<Vec<u32>>,
    }

    impl Scripted {
        fn new(pages: Vec<anyhow::Result<Page<u32>>>) -> Arc<Self> {
            Arc::new(Self {
                pages: Mutex::new(pages.into()),
                requested: Mutex::new(Vec::new()),
            })
        }

        fn requested(&self) -> Vec<u32> {
            self.requested.lock().unwrap().clone()
        }
    }

    fn scripted_engine(script: &Arc<Scripted>) -> PagingEngine<u32> {
        let script = Arc::clone(script);
        PagingEngine::new(0, move |requested: u32| -> PageFuture<'static, u32> {
            script.requested.lock().unwrap().push(requested);
            let next = script
                .pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow::anyhow!("script exhausted")));
            Box::pin(async move { next })
        })
    }

    struct Gated {
        gate: Semaphore,
        started: Notify,
        calls: AtomicUsize,
    }

    impl Gated {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                gate: Semaphore::new(0),
                started: Notify::new(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    struct GatedFetcher(Arc<Gated>);

    impl PageFetcher<u32> for GatedFetcher {
        fn fetch(&self, page: u32) -> PageFuture<'_, u32> {
            let gated = &self.0;
            Box::pin(async move {
                gated.calls.fetch_add(1, Ordering::SeqCst);
                gated.started.notify_one();
                gated.gate.acquire().await?.forget();
                Ok(Page {
                    items: vec![page * 10],
                    next_page: page + 1,
                    has_more: true,
                })
            })
        }
    }

    #[tokio::test]
    async fn refresh_then_load_more_appends() {
        let script = Scripted::new(vec![
            Ok(page(&[1, 2], 1, true)),
            Ok(page(&[3], 2, false)),
        ]);
        let engine = scripted_engine(&script);

        assert_eq!(engine.refresh().await, LoadOutcome::Loaded);
        assert_eq!(engine.load_more().await, LoadOutcome::Loaded);
        let state = engine.state();
        assert_eq!(state.items, vec![1, 2, 3]);
        assert!(!state.has_more);
        assert!(!state.loading && !state.loading_more);
        assert_eq!(script.requested(), vec![0, 1]);
    }

    #[tokio::test]
    async fn subscribers_see_loading_then_loaded() {
        let script = Scripted::new(vec![Ok(page(&[1], 1, true))]);
        let engine = scripted_engine(&script);
        let mut updates = engine.subscribe();

        engine.refresh().await;
        let seen = updates.drain();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].loading && seen[0].items.is_empty());
        assert!(!seen[1].loading);
        assert_eq!(seen[1].items, vec![1]);
        assert_eq!(seen[1].next_page, 1);
    }

    #[tokio::test]
    async fn load_more_without_more_pages_is_noop() {
        let script = Scripted::new(vec![Ok(page(&[1], 1, false))]);
        let engine = scripted_engine(&script);
        engine.refresh().await;

        let mut updates = engine.subscribe();
        let before = engine.state();
        assert_eq!(engine.load_more().await, LoadOutcome::Skipped);
        assert_eq!(engine.state(), before);
        assert_eq!(updates.try_recv(), None);
        assert_eq!(script.requested(), vec![0]);
    }

    #[tokio::test]
    async fn failures_keep_loaded_items() {
        let script = Scripted::new(vec![
            Ok(page(&[1, 2], 1, true)),
            Err(anyhow::anyhow!("timeout")),
            Err(anyhow::anyhow!("offline")),
        ]);
        let engine = scripted_engine(&script);
        engine.refresh().await;

        assert_eq!(engine.load_more().await, LoadOutcome::Failed);
        let state = engine.state();
        assert_eq!(state.items, vec![1, 2]);
        assert_eq!(state.error.as_deref(), Some("timeout"));
        assert!(!state.loading_more);
        assert_eq!(state.next_page, 1);

        assert_eq!(engine.refresh().await, LoadOutcome::Failed);
        let state = engine.state();
        assert_eq!(state.items, vec![1, 2]);
        assert_eq!(state.error.as_deref(), Some("offline"));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn refresh_replaces_items() {
        let script = Scripted::new(vec![
            Ok(page(&[1], 1, true)),
            Ok(page(&[2], 2, true)),
            Ok(page(&[9], 1, true)),
        ]);
        let engine = scripted_engine(&script);
        engine.refresh().await;
        engine.load_more().await;
        engine.refresh().await;
        assert_eq!(engine.state().items, vec![9]);
        assert_eq!(engine.state().next_page, 1);
        assert_eq!(script.requested(), vec![0, 1, 0]);
    }

    #[tokio::test]
    async fn second_refresh_while_pending_is_skipped() {
        let gated = Gated::new();
        let engine = Arc::new(PagingEngine::new(0, GatedFetcher(Arc::clone(&gated))));

        let first = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.refresh().await }
        });
        gated.started.notified().await;
        assert!(engine.state().loading);

        assert_eq!(engine.refresh().await, LoadOutcome::Skipped);
        assert_eq!(gated.calls.load(Ordering::SeqCst), 1);

        gated.gate.add_permits(1);
        assert_eq!(first.await.unwrap(), LoadOutcome::Loaded);
        assert_eq!(gated.calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.state().items, vec![0]);
    }

    #[tokio::test]
    async fn load_more_while_loading_more_is_skipped() {
        let gated = Gated::new();
        let engine = Arc::new(PagingEngine::new(1, GatedFetcher(Arc::clone(&gated))));

        let first = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.load_more().await }
        });
        gated.started.notified().await;
        let pending = engine.state();
        assert!(pending.loading_more);

        assert_eq!(engine.load_more().await, LoadOutcome::Skipped);
        assert_eq!(engine.state(), pending);
        assert_eq!(gated.calls.load(Ordering::SeqCst), 1);

        gated.gate.add_permits(1);
        assert_eq!(first.await.unwrap(), LoadOutcome::Loaded);
        assert_eq!(engine.state().items, vec![10]);
        assert_eq!(engine.state().next_page, 2);
    }

    #[tokio::test]
    async fn refresh_overtakes_pending_load_more() {
        let gated = Gated::new();
        let engine = Arc::new(PagingEngine::new(0, GatedFetcher(Arc::clone(&gated))));
        gated.gate.add_permits(1);
        engine.refresh().await;

        let more = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.load_more().await }
        });
        while gated.calls.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        let refresh = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.refresh().await }
        });
        while gated.calls.load(Ordering::SeqCst) < 3 {
            tokio::task::yield_now().await;
        }
        gated.gate.add_permits(2);

        assert_eq!(refresh.await.unwrap(), LoadOutcome::Loaded);
        assert_eq!(more.await.unwrap(), LoadOutcome::Discarded);
        let state = engine.state();
        assert_eq!(state.items, vec![0]);
        assert!(!state.loading_more);
    }

    #[tokio::test]
    async fn disposed_engine_discards_results() {
        let gated = Gated::new();
        let engine = Arc::new(PagingEngine::new(0, GatedFetcher(Arc::clone(&gated))));
        let mut updates = engine.subscribe();

        let pending = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.refresh().await }
        });
        gated.started.notified().await;
        engine.dispose();
        gated.gate.add_permits(1);

        assert_eq!(pending.await.unwrap(), LoadOutcome::Discarded);
        let seen = updates.drain();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].loading && seen[0].items.is_empty());
        assert_eq!(updates.recv().await, None);
        assert!(engine.state().items.is_empty());
        assert_eq!(engine.refresh().await, LoadOutcome::Skipped);
        assert_eq!(engine.subscribe().recv().await, None);
    }
}
