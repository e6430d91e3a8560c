//! Seams between the navigator and its host environment.
//!
//! Every external capability the navigator needs is a trait here, so the
//! same pipeline runs against a browser shim, a test double, or the
//! in-memory providers in [`memory`](crate::navigation::memory).

use futures_util::future::{self, BoxFuture, FutureExt};

use crate::lifecycle::{Location, NavigationContext};
use crate::navigation::types::{HistoryState, NavigationError, ScrollPosition};
use crate::routing::{LoadedComponent, MatchedRoute};
use crate::subscription::Subscription;
use crate::BoxError;

/// Listener invoked when the user moves through history.
pub type PopStateListener = dyn Fn(Option<HistoryState>) + Send + Sync;

/// Callback consulted when blockers refuse a history pop.
/// Resolving to `true` lets the pop through.
pub type OnBlocked =
    Box<dyn FnOnce(&NavigationContext) -> BoxFuture<'static, bool> + Send + Sync>;

/// The session history stack.
pub trait HistoryProvider: Send + Sync {
    fn location(&self) -> Location;
    fn push(&self, href: &str, state: HistoryState);
    fn replace(&self, href: &str, state: HistoryState);
    /// Move `delta` entries through history. Listeners registered with
    /// [`on_pop_state`](Self::on_pop_state) are notified of the new entry.
    fn go(&self, delta: i64);
    fn history_state(&self) -> Option<HistoryState>;
    fn on_pop_state(&self, listener: Box<PopStateListener>) -> Subscription;
}

/// Session-scoped storage for scroll positions and the intended path.
pub trait StorageProvider: Send + Sync {
    fn save_scroll_position(&self, navigation_id: u64, position: ScrollPosition);
    fn scroll_position(&self, navigation_id: u64) -> Option<ScrollPosition>;
    /// Remember the path a user asked for before a state fallback.
    fn save_intended_path(&self, path: &str);
    /// Take the remembered path. A second call returns `None`.
    fn pop_intended_path(&self) -> Option<String>;
}

/// Picks the layout for a committed route.
pub trait LayoutResolver: Send + Sync {
    fn resolve_layout(
        &self,
        matched: &MatchedRoute,
        state_layout: Option<&str>,
        ctx: &NavigationContext,
    ) -> Result<Option<String>, BoxError>;
}

/// Route layout first, then the state's layout.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLayoutResolver;

impl LayoutResolver for DefaultLayoutResolver {
    fn resolve_layout(
        &self,
        matched: &MatchedRoute,
        state_layout: Option<&str>,
        _ctx: &NavigationContext,
    ) -> Result<Option<String>, BoxError> {
        Ok(matched
            .route
            .layout
            .clone()
            .or_else(|| state_layout.map(str::to_string)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockerVerdict {
    pub proceed: bool,
}

/// Asked before every navigation whether leaving the current page is allowed.
pub trait BlockerCheck: Send + Sync {
    fn check_blockers(
        &self,
        ctx: &NavigationContext,
    ) -> BoxFuture<'static, Result<BlockerVerdict, BoxError>>;
}

/// Never blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl BlockerCheck for AllowAll {
    fn check_blockers(
        &self,
        _ctx: &NavigationContext,
    ) -> BoxFuture<'static, Result<BlockerVerdict, BoxError>> {
        future::ready(Ok(BlockerVerdict { proceed: true })).boxed()
    }
}

/// Asks the user to confirm leaving a page.
pub trait ConfirmDialog: Send + Sync {
    fn confirm(&self, message: &str) -> BoxFuture<'static, bool>;
}

/// Everything the renderer receives on commit.
#[derive(Debug, Clone)]
pub struct RenderCommit {
    pub component: LoadedComponent,
    pub layout: Option<String>,
    pub context: NavigationContext,
}

/// Receives committed pages and owns the viewport.
pub trait RenderSink: Send + Sync {
    fn render(&self, commit: &RenderCommit);

    /// Scroll offset of the page about to be left.
    fn scroll_position(&self) -> Option<ScrollPosition> {
        None
    }

    fn restore_scroll(&self, _position: ScrollPosition) {}
}

/// Renders nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRender;

impl RenderSink for NoopRender {
    fn render(&self, _commit: &RenderCommit) {}
}

/// External observers of navigation outcomes.
pub trait NavigationEvents: Send + Sync {
    /// `ctx` is `None` when the failure happened before a route was resolved.
    fn on_error(&self, _error: &NavigationError, _ctx: Option<&NavigationContext>) {}
    fn on_complete(&self, _ctx: &NavigationContext) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl NavigationEvents for NoopEvents {}
