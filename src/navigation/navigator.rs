//! The navigation pipeline.
//!
//! # Responsibilities
//! - Turn a path into a committed page: resolve, guard, load, commit
//! - Keep PageState and the history stack in sync with what is displayed
//! - Cancel attempts overtaken by a newer navigation or a state change
//!
//! # Pipeline (one attempt)
//! ```text
//! 1. resolve   config redirects / state-mismatch fallback (shared budget)
//! 2. blockers  refuse → BLOCKED (pops may be rescued by on_blocked)
//! 3. before    abort → ABORTED, redirect → restart with replace
//! 4. load      component loader; panic or error → LOAD_FAILED
//! 5. layout    route layout, else state layout (resolver may fail)
//! 6. on        sequential hooks; stale afterwards → CANCELLED
//! 7. commit    render, PageState, history push/replace
//! 8. complete  completion sink, then afterNavigate hooks
//! ```
//!
//! # Design Decisions
//! - Navigation ids are assigned at the start of every attempt, so an
//!   attempt started later always carries the larger id
//! - An attempt is stale when its id is no longer the latest or the state
//!   id moved since the attempt started. Staleness is checked after every
//!   suspension (blockers, before hooks, load, on hooks) and a stale attempt
//!   ends CANCELLED, so it can neither restart nor touch history
//! - Cancelled attempts never write PageState; only the latest attempt
//!   clears `is_navigating`
//! - The route table is read once per attempt from an atomic snapshot

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use arc_swap::ArcSwap;
use futures_util::future::FutureExt;

use crate::config::NavigationConfig;
use crate::lifecycle::hooks::{panic_message, settle};
use crate::lifecycle::{
    GuardResult, HookPhase, Location, NavigationContext, NavigationDirection,
    NavigationLifecycle, NavigationType,
};
use crate::navigation::memory::{MemoryHistory, MemoryStorage};
use crate::navigation::providers::{
    AllowAll, BlockerCheck, DefaultLayoutResolver, HistoryProvider, LayoutResolver,
    NavigationEvents, NoopEvents, NoopRender, OnBlocked, RenderCommit, RenderSink,
    StorageProvider,
};
use crate::navigation::types::{
    HistoryState, NavigateOptions, Navigated, NavigationError, NavigationResult, PageState,
};
use crate::observability::metrics;
use crate::routing::{LoadedComponent, MatchedRoute, RouteMatch, RouteMatcher};
use crate::state::{AppState, StateMachine};

#[derive(Debug, Clone)]
enum Kind {
    Push,
    Replace,
    Pop {
        direction: NavigationDirection,
        entry: Option<HistoryState>,
    },
}

impl Kind {
    fn navigation_type(&self) -> NavigationType {
        match self {
            Kind::Push => NavigationType::Push,
            Kind::Replace => NavigationType::Replace,
            Kind::Pop { .. } => NavigationType::Pop,
        }
    }

    fn direction(&self) -> NavigationDirection {
        match self {
            Kind::Push => NavigationDirection::Forward,
            Kind::Replace => NavigationDirection::None,
            Kind::Pop { direction, .. } => *direction,
        }
    }
}

struct Request {
    target: String,
    kind: Kind,
    payload: Option<serde_json::Value>,
    on_blocked: Option<OnBlocked>,
}

impl Request {
    fn new(target: impl Into<String>, kind: Kind) -> Self {
        Self {
            target: target.into(),
            kind,
            payload: None,
            on_blocked: None,
        }
    }
}

enum Attempt {
    Finished(NavigationResult<Navigated>, Option<NavigationContext>),
    Restart(String),
}

/// Counts redirect hops of one navigation across restarts.
struct RedirectBudget {
    limit: u32,
    followed: u32,
}

impl RedirectBudget {
    fn follow(&mut self, to: &str, source: &'static str) -> NavigationResult<()> {
        self.followed += 1;
        if self.followed > self.limit {
            return Err(NavigationError::TooManyRedirects {
                path: to.to_string(),
                limit: self.limit,
            });
        }
        tracing::debug!(to, source, hop = self.followed, "Following redirect");
        metrics::record_redirect(source);
        Ok(())
    }
}

/// Orchestrates navigations for one application.
pub struct Navigator {
    routes: ArcSwap<RouteMatcher>,
    states: Arc<StateMachine>,
    lifecycle: Arc<NavigationLifecycle>,
    history: Arc<dyn HistoryProvider>,
    storage: Arc<dyn StorageProvider>,
    layouts: Arc<dyn LayoutResolver>,
    blockers: Arc<dyn BlockerCheck>,
    render: Arc<dyn RenderSink>,
    events: Arc<dyn NavigationEvents>,
    config: NavigationConfig,
    page: Mutex<PageState>,
    /// History record of the committed page.
    current_entry: Mutex<Option<HistoryState>>,
    last_navigation_id: AtomicU64,
    /// Set while a refused pop is being undone.
    restoring_pop: AtomicBool,
}

impl Navigator {
    pub fn builder(routes: RouteMatcher, states: Arc<StateMachine>) -> NavigatorBuilder {
        NavigatorBuilder::new(routes, states)
    }

    /// Navigate to `path` (may carry a query and hash).
    pub async fn navigate(
        &self,
        path: &str,
        options: NavigateOptions,
    ) -> NavigationResult<Navigated> {
        let kind = if options.replace {
            Kind::Replace
        } else {
            Kind::Push
        };
        let mut request = Request::new(path, kind);
        request.payload = options.payload;
        self.run(request).await
    }

    /// Navigate to the page that fits `new_state`, replacing the current entry.
    ///
    /// Target order: `path`, then the remembered intended path when it
    /// matches a route of `new_state`, then the state's default path.
    /// Returns `Ok(None)` when there is nowhere to go.
    pub async fn navigate_after_state_change(
        &self,
        new_state: impl Into<AppState>,
        path: Option<&str>,
    ) -> NavigationResult<Option<Navigated>> {
        let new_state = new_state.into();
        let current = self.states.state();
        if current != new_state {
            tracing::warn!(
                expected = %new_state,
                current = %current,
                "Navigating after a state change the state machine does not reflect"
            );
        }

        let target = match path {
            Some(path) => {
                self.storage.pop_intended_path();
                Some(path.to_string())
            }
            None => self.take_intended_path(&new_state).or_else(|| {
                self.routes
                    .load()
                    .default_path(&new_state)
                    .map(str::to_string)
            }),
        };

        let Some(target) = target else {
            tracing::debug!(state = %new_state, "No target after state change");
            return Ok(None);
        };
        self.run(Request::new(target, Kind::Replace)).await.map(Some)
    }

    /// Handle the user moving through history to the current location.
    ///
    /// `on_blocked` is consulted when blockers refuse; without it, or when it
    /// declines, the pop is undone and BLOCKED is returned.
    pub async fn handle_pop_state(
        &self,
        entry: Option<HistoryState>,
        direction: NavigationDirection,
        on_blocked: Option<OnBlocked>,
    ) -> NavigationResult<Navigated> {
        let target = self.history.location().href();
        if self.restoring_pop.swap(false, Ordering::SeqCst) {
            tracing::debug!(path = %target, "Ignoring pop that undoes a blocked pop");
            return Err(NavigationError::Cancelled {
                path: target,
                navigation_id: self.last_navigation_id.load(Ordering::SeqCst),
            });
        }

        let mut request = Request::new(target, Kind::Pop { direction, entry });
        request.on_blocked = on_blocked;
        self.run(request).await
    }

    /// First navigation, to the history provider's current location.
    pub async fn initialize(&self) -> NavigationResult<Navigated> {
        let target = self.history.location().href();
        self.run(Request::new(target, Kind::Replace)).await
    }

    pub fn back(&self) {
        self.history.go(-1);
    }

    pub fn forward(&self) {
        self.history.go(1);
    }

    /// Swap the route table. Attempts already running keep their snapshot.
    pub fn replace_routes(&self, routes: RouteMatcher) {
        let states = routes.states().count();
        self.routes.store(Arc::new(routes));
        tracing::info!(states, "Route table replaced");
    }

    /// Snapshot of the current route table.
    pub fn routes(&self) -> Arc<RouteMatcher> {
        self.routes.load_full()
    }

    pub fn page_state(&self) -> PageState {
        self.page().clone()
    }

    pub fn state_machine(&self) -> &Arc<StateMachine> {
        &self.states
    }

    pub fn lifecycle(&self) -> &Arc<NavigationLifecycle> {
        &self.lifecycle
    }

    pub fn history(&self) -> &Arc<dyn HistoryProvider> {
        &self.history
    }

    pub fn storage(&self) -> &Arc<dyn StorageProvider> {
        &self.storage
    }

    async fn run(&self, mut request: Request) -> NavigationResult<Navigated> {
        let started = Instant::now();
        let mut redirects = RedirectBudget {
            limit: self.config.max_redirects,
            followed: 0,
        };
        if !matches!(request.kind, Kind::Pop { .. }) {
            self.restoring_pop.store(false, Ordering::SeqCst);
        }

        loop {
            let navigation_id = self.begin();
            match self.attempt(&mut request, navigation_id, &mut redirects).await {
                Attempt::Finished(result, ctx) => {
                    self.finish(navigation_id, &result, ctx.as_ref(), started);
                    return result;
                }
                Attempt::Restart(to) => {
                    tracing::debug!(navigation_id, to = %to, "beforeNavigate redirect");
                    request.target = to;
                    request.kind = Kind::Replace;
                }
            }
        }
    }

    fn begin(&self) -> u64 {
        let navigation_id = self.last_navigation_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.page().is_navigating = true;
        navigation_id
    }

    async fn attempt(
        &self,
        request: &mut Request,
        navigation_id: u64,
        redirects: &mut RedirectBudget,
    ) -> Attempt {
        let routes = self.routes.load_full();
        let state = self.states.state();
        let state_id = self.states.state_id();

        let (location, matched) = match self.resolve(&routes, &request.target, &state, redirects)
        {
            Ok(resolved) => resolved,
            Err(e) => return Attempt::Finished(Err(e), None),
        };
        let path = location.pathname.clone();

        let ctx = NavigationContext {
            from: self.committed_location(),
            to: location,
            navigation_type: request.kind.navigation_type(),
            direction: request.kind.direction(),
            navigation_id,
            state: state.clone(),
            route: matched.route.path.clone(),
            params: matched.params.clone(),
        };
        tracing::debug!(
            navigation_id,
            path = %ctx.to,
            route = %ctx.route,
            state = %state,
            "Navigation resolved"
        );

        if let Err(e) = self.check_blockers(&ctx, state_id, request).await {
            return Attempt::Finished(Err(e), Some(ctx));
        }
        if self.is_stale(navigation_id, state_id) {
            return Attempt::Finished(Err(cancelled(&path, navigation_id)), Some(ctx));
        }

        let guard = self.lifecycle.run_before(&ctx).await;
        if self.is_stale(navigation_id, state_id) {
            return Attempt::Finished(Err(cancelled(&path, navigation_id)), Some(ctx));
        }
        match guard {
            GuardResult::Proceed => {}
            GuardResult::Abort => {
                return Attempt::Finished(Err(NavigationError::Aborted { path }), Some(ctx));
            }
            GuardResult::Redirect(to) => {
                return match redirects.follow(&to, "hook") {
                    Ok(()) => Attempt::Restart(to),
                    Err(e) => Attempt::Finished(Err(e), Some(ctx)),
                };
            }
        }

        let loader = &matched.route.loader;
        let loaded = settle(catch_unwind(AssertUnwindSafe(|| loader.load()))).await;
        if self.is_stale(navigation_id, state_id) {
            return Attempt::Finished(Err(cancelled(&path, navigation_id)), Some(ctx));
        }
        let component = match loaded {
            Ok(component) => component,
            Err(e) => {
                return Attempt::Finished(Err(NavigationError::load_failed(&path, e)), Some(ctx));
            }
        };

        let resolved = catch_unwind(AssertUnwindSafe(|| {
            self.layouts
                .resolve_layout(&matched, routes.state_layout(&state), &ctx)
        }))
        .unwrap_or_else(|payload| Err(panic_message(payload).into()));
        let layout = match resolved {
            Ok(layout) => layout,
            Err(e) => {
                return Attempt::Finished(Err(NavigationError::load_failed(&path, e)), Some(ctx));
            }
        };

        self.lifecycle.run_on(&ctx).await;
        if self.is_stale(navigation_id, state_id) {
            return Attempt::Finished(Err(cancelled(&path, navigation_id)), Some(ctx));
        }

        self.commit(&ctx, &matched, component, layout.clone(), request);

        self.events.on_complete(&ctx);
        self.lifecycle.run_after(&ctx);

        Attempt::Finished(
            Ok(Navigated {
                context: ctx.clone(),
                layout,
            }),
            Some(ctx),
        )
    }

    /// Follow config redirects and state fallbacks until a route matches.
    fn resolve(
        &self,
        routes: &RouteMatcher,
        target: &str,
        state: &AppState,
        redirects: &mut RedirectBudget,
    ) -> NavigationResult<(Location, MatchedRoute)> {
        let mut current = target.to_string();
        loop {
            let location = Location::parse(&current).map_err(|e| {
                tracing::debug!(path = %current, error = %e, "Unparseable navigation target");
                NavigationError::NotFound {
                    path: current.clone(),
                }
            })?;

            match routes.match_path(&location.pathname, state) {
                Some(RouteMatch::Matched(matched)) => return Ok((location, matched)),
                Some(RouteMatch::Redirect(to)) => {
                    redirects.follow(&to, "config")?;
                    current = to;
                }
                Some(RouteMatch::StateMismatch(mismatch)) => {
                    self.storage.save_intended_path(&location.href());
                    let Some(fallback) = routes.default_path(state) else {
                        return Err(NavigationError::StateMismatch {
                            path: mismatch.pathname,
                            current_state: mismatch.requested_state,
                            available_in_state: mismatch.available_in_state,
                        });
                    };
                    tracing::info!(
                        path = %mismatch.pathname,
                        state = %state,
                        available_in = %mismatch.available_in_state,
                        fallback,
                        "Path belongs to another state, falling back"
                    );
                    redirects.follow(fallback, "fallback")?;
                    current = fallback.to_string();
                }
                None => {
                    return Err(NavigationError::NotFound {
                        path: location.pathname,
                    })
                }
            }
        }
    }

    async fn check_blockers(
        &self,
        ctx: &NavigationContext,
        state_id: u64,
        request: &mut Request,
    ) -> NavigationResult<()> {
        let started = catch_unwind(AssertUnwindSafe(|| self.blockers.check_blockers(ctx)));
        let proceed = match settle(started).await {
            Ok(verdict) => verdict.proceed,
            Err(e) => {
                self.lifecycle
                    .report(HookPhase::Blocker, ctx.navigation_id, e.to_string());
                false
            }
        };
        if proceed {
            return Ok(());
        }
        // A superseded pop must not prompt or rewind history under the newer page.
        if self.is_stale(ctx.navigation_id, state_id) {
            return Err(cancelled(&ctx.to.pathname, ctx.navigation_id));
        }

        if let Kind::Pop { direction, .. } = request.kind {
            if let Some(on_blocked) = request.on_blocked.take() {
                let rescued = AssertUnwindSafe(on_blocked(ctx))
                    .catch_unwind()
                    .await
                    .unwrap_or(false);
                if rescued {
                    tracing::debug!(navigation_id = ctx.navigation_id, "Blocked pop confirmed");
                    return Ok(());
                }
                if self.is_stale(ctx.navigation_id, state_id) {
                    return Err(cancelled(&ctx.to.pathname, ctx.navigation_id));
                }
            }
            let undo = match direction {
                NavigationDirection::Back => 1,
                NavigationDirection::Forward => -1,
                NavigationDirection::None => 0,
            };
            if undo != 0 {
                self.restoring_pop.store(true, Ordering::SeqCst);
                self.history.go(undo);
            }
        }

        Err(NavigationError::Blocked {
            path: ctx.to.pathname.clone(),
        })
    }

    fn commit(
        &self,
        ctx: &NavigationContext,
        matched: &MatchedRoute,
        component: LoadedComponent,
        layout: Option<String>,
        request: &Request,
    ) {
        let outgoing = self.entry().clone();
        if let (Some(entry), Some(position)) = (&outgoing, self.render.scroll_position()) {
            self.storage
                .save_scroll_position(entry.navigation_id, position);
        }

        self.render.render(&RenderCommit {
            component,
            layout,
            context: ctx.clone(),
        });

        {
            let mut page = self.page();
            page.pathname = ctx.to.pathname.clone();
            page.search = ctx.to.search.clone();
            page.hash = ctx.to.hash.clone();
            page.params = matched.params.clone();
            page.route = Some(ctx.route.clone());
            page.app_state = Some(ctx.state.clone());
            page.error = None;
            page.is_navigating =
                self.last_navigation_id.load(Ordering::SeqCst) != ctx.navigation_id;
        }

        let href = ctx.to.href();
        let outgoing_position = outgoing.as_ref().map(|e| e.position);
        let entry = match &request.kind {
            Kind::Push => {
                let entry = HistoryState::new(
                    ctx.navigation_id,
                    outgoing_position.map_or(0, |p| p + 1),
                    ctx.state.clone(),
                    request.payload.clone(),
                );
                self.history.push(&href, entry.clone());
                entry
            }
            Kind::Replace => {
                let entry = HistoryState::new(
                    ctx.navigation_id,
                    outgoing_position.unwrap_or(0),
                    ctx.state.clone(),
                    request.payload.clone(),
                );
                self.history.replace(&href, entry.clone());
                entry
            }
            Kind::Pop { direction, entry } => match entry {
                Some(entry) => {
                    if let Some(position) = self.storage.scroll_position(entry.navigation_id) {
                        self.render.restore_scroll(position);
                    }
                    entry.clone()
                }
                None => {
                    let position = match (outgoing_position, direction) {
                        (Some(p), NavigationDirection::Back) => p.saturating_sub(1),
                        (Some(p), NavigationDirection::Forward) => p + 1,
                        (Some(p), NavigationDirection::None) => p,
                        (None, _) => 0,
                    };
                    HistoryState::new(ctx.navigation_id, position, ctx.state.clone(), None)
                }
            },
        };
        *self.entry() = Some(entry);
    }

    fn finish(
        &self,
        navigation_id: u64,
        result: &NavigationResult<Navigated>,
        ctx: Option<&NavigationContext>,
        started: Instant,
    ) {
        let outcome = match result {
            Ok(_) => "ok",
            Err(e) => e.code().as_str(),
        };
        metrics::record_navigation(outcome, started);

        match result {
            Ok(navigated) => tracing::info!(
                navigation_id,
                path = %navigated.context.to,
                state = %navigated.context.state,
                "Navigation committed"
            ),
            Err(NavigationError::Cancelled { path, .. }) => {
                tracing::debug!(navigation_id, path = %path, "Navigation cancelled")
            }
            Err(e) => {
                tracing::warn!(navigation_id, code = %e.code(), error = %e, "Navigation failed");
                self.events.on_error(e, ctx);
            }
        }

        if self.last_navigation_id.load(Ordering::SeqCst) != navigation_id {
            return;
        }
        let mut page = self.page();
        page.is_navigating = false;
        if let Err(e) = result {
            if !matches!(e, NavigationError::Cancelled { .. }) {
                page.error = Some(e.clone());
            }
        }
    }

    fn is_stale(&self, navigation_id: u64, state_id: u64) -> bool {
        self.last_navigation_id.load(Ordering::SeqCst) != navigation_id
            || self.states.state_id() != state_id
    }

    fn committed_location(&self) -> Option<Location> {
        let page = self.page();
        page.route.as_ref().map(|_| Location {
            pathname: page.pathname.clone(),
            search: page.search.clone(),
            hash: page.hash.clone(),
        })
    }

    fn take_intended_path(&self, state: &AppState) -> Option<String> {
        let intended = self.storage.pop_intended_path()?;
        let pathname = Location::parse(&intended).ok()?.pathname;
        match self.routes.load().match_path(&pathname, state) {
            Some(RouteMatch::Matched(_)) => Some(intended),
            _ => {
                tracing::debug!(path = %intended, state = %state, "Dropping intended path");
                None
            }
        }
    }

    fn page(&self) -> MutexGuard<'_, PageState> {
        self.page.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self) -> MutexGuard<'_, Option<HistoryState>> {
        self.current_entry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn cancelled(path: &str, navigation_id: u64) -> NavigationError {
    NavigationError::Cancelled {
        path: path.to_string(),
        navigation_id,
    }
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("state", &self.states.state())
            .field(
                "last_navigation_id",
                &self.last_navigation_id.load(Ordering::SeqCst),
            )
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Navigator`]. Every collaborator has an in-process default.
pub struct NavigatorBuilder {
    routes: RouteMatcher,
    states: Arc<StateMachine>,
    config: NavigationConfig,
    lifecycle: Option<Arc<NavigationLifecycle>>,
    history: Option<Arc<dyn HistoryProvider>>,
    storage: Option<Arc<dyn StorageProvider>>,
    layouts: Option<Arc<dyn LayoutResolver>>,
    blockers: Option<Arc<dyn BlockerCheck>>,
    render: Option<Arc<dyn RenderSink>>,
    events: Option<Arc<dyn NavigationEvents>>,
}

impl NavigatorBuilder {
    pub fn new(routes: RouteMatcher, states: Arc<StateMachine>) -> Self {
        Self {
            routes,
            states,
            config: NavigationConfig::default(),
            lifecycle: None,
            history: None,
            storage: None,
            layouts: None,
            blockers: None,
            render: None,
            events: None,
        }
    }

    pub fn config(mut self, config: NavigationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn lifecycle(mut self, lifecycle: Arc<NavigationLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn history(mut self, history: Arc<dyn HistoryProvider>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn StorageProvider>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn layout_resolver(mut self, layouts: Arc<dyn LayoutResolver>) -> Self {
        self.layouts = Some(layouts);
        self
    }

    pub fn blockers(mut self, blockers: Arc<dyn BlockerCheck>) -> Self {
        self.blockers = Some(blockers);
        self
    }

    pub fn render(mut self, render: Arc<dyn RenderSink>) -> Self {
        self.render = Some(render);
        self
    }

    pub fn events(mut self, events: Arc<dyn NavigationEvents>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Navigator {
        let storage = self.storage.unwrap_or_else(|| {
            Arc::new(MemoryStorage::new(self.config.scroll_cache_capacity))
        });
        Navigator {
            routes: ArcSwap::from_pointee(self.routes),
            states: self.states,
            lifecycle: self.lifecycle.unwrap_or_default(),
            history: self
                .history
                .unwrap_or_else(|| Arc::new(MemoryHistory::default())),
            storage,
            layouts: self
                .layouts
                .unwrap_or_else(|| Arc::new(DefaultLayoutResolver)),
            blockers: self.blockers.unwrap_or_else(|| Arc::new(AllowAll)),
            render: self.render.unwrap_or_else(|| Arc::new(NoopRender)),
            events: self.events.unwrap_or_else(|| Arc::new(NoopEvents)),
            config: self.config,
            page: Mutex::new(PageState::default()),
            current_entry: Mutex::new(None),
            last_navigation_id: AtomicU64::new(0),
            restoring_pop: AtomicBool::new(false),
        }
    }
}
