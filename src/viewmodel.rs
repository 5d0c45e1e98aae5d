//! Paginated, filterable, searchable view over one remote collection.
//!
//! A [`CollectionViewModel`] is owned by a single screen. Every operation
//! takes `&self` so concurrent UI events (keystrokes, scroll, button presses)
//! can drive it from separate tasks; state lives behind a mutex that is never
//! held across an `.await`.
//!
//! Ordering rules:
//! * every fetch gets a sequence number; only the response to the latest one
//!   whose search/filters still match the current state is applied
//! * `load_more` is single-flight: it does nothing while any fetch is pending
//! * after [`CollectionViewModel::dispose`] no response is applied
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::{CollectionService, DeleteOptions, Page};
use crate::config::{Config, Resource};
use crate::error::{CollectionError, CollectionResult};
use crate::model::{Entity, EntityId};
use crate::notify::{Confirm, Notice, Notifier};
use crate::query::{self, FilterSpec, Filters, ListQuery};
use crate::reconcile::{append_page, reconcile, Counters, Mutation};
use crate::session::{Role, SessionContext};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// What happened to a fetch response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// Superseded by a newer request, or the view was disposed.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// The user declined the confirmation; nothing was sent.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ViewOptions {
    pub page_size: u32,
    pub debounce: Duration,
    pub filters: FilterSpec,
    pub required_role: Option<Role>,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            debounce: DEFAULT_SEARCH_DEBOUNCE,
            filters: FilterSpec::default(),
            required_role: None,
        }
    }
}

impl ViewOptions {
    pub fn from_config(cfg: &Config, resource: &Resource) -> Self {
        Self {
            page_size: cfg.app.page_size,
            debounce: cfg.search_debounce(),
            filters: resource.filter_spec(),
            required_role: resource.required_role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    /// Blocking load of a page, replacing the list.
    Replace,
    /// Pull-to-refresh of page 1, replacing the list.
    Refresh,
    /// Infinite scroll: next page appended.
    Append,
}

#[derive(Debug)]
struct Ticket {
    seq: u64,
    kind: FetchKind,
    query: ListQuery,
}

/// Point-in-time copy of the view state for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSnapshot<E> {
    pub items: Vec<E>,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub total: Option<u64>,
    pub filters: Filters,
    pub search_term: String,
    pub phase: Phase,
    pub is_loading: bool,
    pub is_refreshing: bool,
    pub is_loading_more: bool,
    pub counters: Counters,
    pub last_error: Option<String>,
}

struct ListState<E> {
    items: Vec<E>,
    page: u32,
    total_pages: u32,
    total: Option<u64>,
    filters: Filters,
    search_term: String,
    /// Trimmed search term of the last list request still expected to land.
    requested_search: Option<String>,
    has_loaded: bool,
    phase: Phase,
    is_loading: bool,
    is_refreshing: bool,
    is_loading_more: bool,
    latest_seq: u64,
    in_flight: Option<u64>,
    debounce_gen: u64,
    counters: Counters,
    stats_loaded: bool,
    last_error: Option<String>,
    failed_fetch: Option<(FetchKind, u32)>,
    disposed: bool,
}

impl<E> ListState<E> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            page: 1,
            total_pages: 1,
            total: None,
            filters: Filters::new(),
            search_term: String::new(),
            requested_search: None,
            has_loaded: false,
            phase: Phase::Idle,
            is_loading: false,
            is_refreshing: false,
            is_loading_more: false,
            latest_seq: 0,
            in_flight: None,
            debounce_gen: 0,
            counters: Counters::default(),
            stats_loaded: false,
            last_error: None,
            failed_fetch: None,
            disposed: false,
        }
    }

    fn params_match(&self, query: &ListQuery) -> bool {
        self.filters == query.filters && self.search_term.trim() == query.search
    }

    fn clear_flags(&mut self) {
        self.in_flight = None;
        self.is_loading = false;
        self.is_refreshing = false;
        self.is_loading_more = false;
    }
}

pub struct CollectionViewModel<E: Entity> {
    service: Arc<dyn CollectionService<E>>,
    session: SessionContext,
    notifier: Arc<dyn Notifier>,
    options: ViewOptions,
    state: Mutex<ListState<E>>,
}

impl<E: Entity> CollectionViewModel<E> {
    /// Fails with [`CollectionError::Forbidden`] when the session's role does
    /// not allow opening this collection.
    pub fn new(
        service: Arc<dyn CollectionService<E>>,
        session: SessionContext,
        notifier: Arc<dyn Notifier>,
        options: ViewOptions,
    ) -> CollectionResult<Self> {
        session.ensure_role(options.required_role)?;
        let options = ViewOptions {
            page_size: options.page_size.max(1),
            ..options
        };
        Ok(Self {
            service,
            session,
            notifier,
            options,
            state: Mutex::new(ListState::new()),
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn state(&self) -> MutexGuard<'_, ListState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ListSnapshot<E> {
        let st = self.state();
        ListSnapshot {
            items: st.items.clone(),
            page: st.page,
            page_size: self.options.page_size,
            total_pages: st.total_pages,
            total: st.total,
            filters: st.filters.clone(),
            search_term: st.search_term.clone(),
            phase: st.phase,
            is_loading: st.is_loading,
            is_refreshing: st.is_refreshing,
            is_loading_more: st.is_loading_more,
            counters: st.counters,
            last_error: st.last_error.clone(),
        }
    }

    pub fn items(&self) -> Vec<E> {
        self.state().items.clone()
    }

    pub fn page(&self) -> u32 {
        self.state().page
    }

    pub fn total_pages(&self) -> u32 {
        self.state().total_pages
    }

    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    pub fn counters(&self) -> Counters {
        self.state().counters
    }

    pub fn filters(&self) -> Filters {
        self.state().filters.clone()
    }

    pub fn search_term(&self) -> String {
        self.state().search_term.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading
    }

    pub fn is_refreshing(&self) -> bool {
        self.state().is_refreshing
    }

    pub fn is_disposed(&self) -> bool {
        self.state().disposed
    }

    /// Fetch `page` with the given filters and search, replacing the list.
    /// Filter values the endpoint does not accept are dropped ("all").
    pub async fn load(
        &self,
        page: u32,
        filters: Filters,
        search: &str,
    ) -> CollectionResult<LoadOutcome> {
        let ticket = {
            let mut st = self.state();
            if st.disposed {
                return Ok(LoadOutcome::Discarded);
            }
            st.filters = self.options.filters.sanitize(&filters);
            st.search_term = search.to_string();
            self.begin(&mut st, FetchKind::Replace, page)
        };
        self.run(ticket).await
    }

    /// Record the typed term and, once the debounce window passes without
    /// another call, fetch page 1 for it. Returns `Ok(None)` when this call
    /// was superseded by a later keystroke or did not change the effective
    /// (trimmed) term.
    pub async fn search(&self, term: &str) -> CollectionResult<Option<LoadOutcome>> {
        let generation = {
            let mut st = self.state();
            if st.disposed {
                return Ok(None);
            }
            st.search_term = term.to_string();
            st.debounce_gen += 1;
            st.debounce_gen
        };

        tokio::time::sleep(self.options.debounce).await;

        let ticket = {
            let mut st = self.state();
            if st.disposed || st.debounce_gen != generation {
                return Ok(None);
            }
            let effective = st.search_term.trim();
            if st.requested_search.as_deref() == Some(effective) {
                debug!(term = effective, "search term unchanged; skipping fetch");
                return Ok(None);
            }
            self.begin(&mut st, FetchKind::Replace, 1)
        };
        self.run(ticket).await.map(Some)
    }

    /// Set (`Some`) or clear (`None`) one filter and reload from page 1.
    pub async fn change_filter(
        &self,
        name: &str,
        value: Option<&str>,
    ) -> CollectionResult<LoadOutcome> {
        let ticket = {
            let mut st = self.state();
            if st.disposed {
                return Ok(LoadOutcome::Discarded);
            }
            match value {
                Some(v) if self.options.filters.accepts(name, v) => {
                    st.filters.insert(name.to_string(), v.to_string());
                }
                Some(v) => {
                    warn!(filter = name, value = v, "unsupported filter value; showing all");
                    st.filters.remove(name);
                }
                None => {
                    st.filters.remove(name);
                }
            }
            self.begin(&mut st, FetchKind::Replace, 1)
        };
        self.run(ticket).await
    }

    /// Fetch the next page and append it. `Ok(None)` without a request when
    /// already on the last page or while another fetch is pending.
    pub async fn load_more(&self) -> CollectionResult<Option<LoadOutcome>> {
        let ticket = {
            let mut st = self.state();
            if st.disposed {
                return Ok(None);
            }
            if let Some(seq) = st.in_flight {
                debug!(seq, "fetch in flight; load_more ignored");
                return Ok(None);
            }
            if st.page >= st.total_pages {
                return Ok(None);
            }
            let next = st.page + 1;
            self.begin(&mut st, FetchKind::Append, next)
        };
        self.run(ticket).await.map(Some)
    }

    /// Re-fetch page 1 with the current search and filters, replacing the list.
    pub async fn refresh(&self) -> CollectionResult<LoadOutcome> {
        let ticket = {
            let mut st = self.state();
            if st.disposed {
                return Ok(LoadOutcome::Discarded);
            }
            self.begin(&mut st, FetchKind::Refresh, 1)
        };
        self.run(ticket).await
    }

    /// Re-issue the fetch that last failed. `Ok(None)` unless the view is in
    /// the `Failed` phase.
    pub async fn retry(&self) -> CollectionResult<Option<LoadOutcome>> {
        let ticket = {
            let mut st = self.state();
            if st.disposed || st.phase != Phase::Failed {
                return Ok(None);
            }
            let Some((kind, page)) = st.failed_fetch else {
                return Ok(None);
            };
            self.begin(&mut st, kind, page)
        };
        self.run(ticket).await.map(Some)
    }

    /// Submit a new entity; on success it is appended to the list and the
    /// counters grow by one.
    pub async fn create(&self, payload: &Value) -> CollectionResult<E> {
        match self.service.create(payload).await {
            Ok(created) => {
                self.apply_mutation(Mutation::Created(created.clone()));
                self.notify(Notice::success("Created successfully"));
                Ok(created)
            }
            Err(err) => Err(self.report(err)),
        }
    }

    /// Submit a partial update; on success the listed row is replaced in place.
    pub async fn update(&self, id: &EntityId, payload: &Value) -> CollectionResult<E> {
        match self.service.update(id, payload).await {
            Ok(updated) => {
                self.apply_mutation(Mutation::Updated(updated.clone()));
                self.notify(Notice::success("Updated successfully"));
                Ok(updated)
            }
            Err(err) => Err(self.report(err)),
        }
    }

    /// Delete after explicit confirmation. On success the row leaves the list
    /// and the counters it contributed to shrink.
    pub async fn remove(
        &self,
        id: &EntityId,
        options: Option<DeleteOptions>,
        confirm: &dyn Confirm,
    ) -> CollectionResult<RemoveOutcome> {
        let prompt = match options {
            Some(DeleteOptions {
                delete_all_data: true,
            }) => format!("Delete {} and all of its data? This cannot be undone.", id),
            _ => format!("Delete {}? This cannot be undone.", id),
        };
        if !confirm.confirm(&prompt) {
            debug!(%id, "delete cancelled by user");
            return Ok(RemoveOutcome::Cancelled);
        }

        match self.service.delete(id, options).await {
            Ok(()) => {
                self.apply_mutation(Mutation::Removed(id.clone()));
                self.notify(Notice::success("Deleted successfully"));
                Ok(RemoveOutcome::Removed)
            }
            Err(err) => Err(self.report(err)),
        }
    }

    /// Replace the counters with the backend's `/stats`.
    pub async fn refresh_stats(&self) -> CollectionResult<Counters> {
        match self.service.stats().await {
            Ok(stats) => {
                let counters = Counters::from_stats(&stats);
                let mut st = self.state();
                if !st.disposed {
                    st.counters = counters;
                    st.stats_loaded = true;
                }
                Ok(counters)
            }
            Err(err) => Err(self.report(err)),
        }
    }

    /// Tear the view down: pending debounced searches are cancelled and any
    /// response still in flight is dropped when it arrives.
    pub fn dispose(&self) {
        let mut st = self.state();
        st.disposed = true;
        st.debounce_gen += 1;
        st.clear_flags();
    }

    fn begin(&self, st: &mut ListState<E>, kind: FetchKind, page: u32) -> Ticket {
        let page = page.max(1);
        st.latest_seq += 1;
        let seq = st.latest_seq;
        st.in_flight = Some(seq);
        st.phase = Phase::Loading;
        st.is_loading = kind == FetchKind::Replace;
        st.is_refreshing = kind == FetchKind::Refresh;
        st.is_loading_more = kind == FetchKind::Append;

        let search = st.search_term.trim().to_string();
        if kind != FetchKind::Append {
            st.page = page;
            st.requested_search = Some(search.clone());
        }

        let mut query = ListQuery::new(page, self.options.page_size);
        query.search = search;
        query.filters = st.filters.clone();
        debug!(seq, ?kind, page, "fetch started");
        Ticket { seq, kind, query }
    }

    async fn run(&self, ticket: Ticket) -> CollectionResult<LoadOutcome> {
        let result = self.service.list(&ticket.query).await;

        let mut st = self.state();
        if st.disposed {
            debug!(seq = ticket.seq, "view disposed; dropping response");
            return Ok(LoadOutcome::Discarded);
        }
        if ticket.seq != st.latest_seq {
            debug!(
                seq = ticket.seq,
                latest = st.latest_seq,
                "stale response discarded"
            );
            return Ok(LoadOutcome::Discarded);
        }
        if !st.params_match(&ticket.query) {
            // Nothing newer is in flight: settle so the next search or
            // filter change issues a fresh request.
            debug!(seq = ticket.seq, "response for outdated search/filters discarded");
            st.clear_flags();
            st.requested_search = None;
            st.phase = if st.has_loaded {
                Phase::Loaded
            } else {
                Phase::Idle
            };
            return Ok(LoadOutcome::Discarded);
        }
        st.clear_flags();

        match result {
            Ok(page) => {
                self.apply_page(&mut st, &ticket, page);
                Ok(LoadOutcome::Applied)
            }
            Err(err) => {
                st.phase = Phase::Failed;
                st.failed_fetch = Some((ticket.kind, ticket.query.page));
                if ticket.kind != FetchKind::Append {
                    // The term never landed; searching it again must refetch.
                    st.requested_search = None;
                }
                st.last_error = Some(err.user_message());
                drop(st);
                warn!(seq = ticket.seq, %err, "list fetch failed");
                self.notify(Notice::error(err.user_message()));
                Err(err)
            }
        }
    }

    fn apply_page(&self, st: &mut ListState<E>, ticket: &Ticket, page: Page<E>) {
        let page_no = ticket.query.page;
        let received = page.items.len();
        st.total_pages = match page.total {
            Some(total) => query::total_pages(total, self.options.page_size),
            // Bare arrays carry no total; a full page means there may be more.
            None if received >= self.options.page_size as usize => page_no + 1,
            None => page_no,
        };
        st.total = page.total;

        match ticket.kind {
            FetchKind::Replace | FetchKind::Refresh => st.items = page.items,
            FetchKind::Append => append_page(&mut st.items, page.items),
        }
        st.page = page_no;
        st.phase = Phase::Loaded;
        st.has_loaded = true;
        st.last_error = None;
        st.failed_fetch = None;

        if !st.stats_loaded {
            if let Some(total) = page.total {
                st.counters.total = total;
            }
        }
        info!(
            seq = ticket.seq,
            page = page_no,
            total_pages = st.total_pages,
            rows = received,
            "page applied"
        );
    }

    fn apply_mutation(&self, mutation: Mutation<E>) {
        let mut st = self.state();
        if st.disposed {
            return;
        }
        let previous = st
            .items
            .iter()
            .find(|e| e.id() == mutation.id())
            .cloned();
        st.items = reconcile(&st.items, &mutation);
        st.counters.apply(&mutation, previous.as_ref());
        if let Some(total) = st.total {
            let total = match &mutation {
                Mutation::Created(_) if previous.is_none() => total + 1,
                Mutation::Removed(_) => total.saturating_sub(1),
                _ => total,
            };
            st.total = Some(total);
            st.total_pages = query::total_pages(total, self.options.page_size);
        }
        debug!(kind = ?mutation.kind(), id = %mutation.id(), "local list reconciled");
    }

    fn report(&self, err: CollectionError) -> CollectionError {
        warn!(%err, "collection mutation failed");
        self.notify(Notice::error(err.user_message()));
        err
    }

    fn notify(&self, notice: Notice) {
        if self.is_disposed() {
            debug!(message = %notice.message, "view disposed; notice dropped");
            return;
        }
        self.notifier.notify(notice);
    }
}
