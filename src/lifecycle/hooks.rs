//! Navigation hook registries.
//!
//! # Execution Contracts
//! ```text
//! beforeNavigate : all hooks concurrently, phase awaits every hook
//!                  any Abort (or failure) wins > first-registered Redirect > Proceed
//! onNavigate     : strictly sequential, each awaited before the next starts
//!                  failures reported, remaining hooks still run
//! afterNavigate  : synchronous, fire-and-forget, after commit
//!                  failures reported, remaining hooks still run
//! ```
//!
//! # Design Decisions
//! - A failing hook is an `Err` or a panic; both are caught at the call site
//! - Failures go to the diagnostics channel tagged with the phase
//! - Registries belong to one lifecycle instance; nothing is global

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture, FutureExt};

use crate::lifecycle::context::NavigationContext;
use crate::observability::metrics;
use crate::subscription::{ListenerRegistry, Subscription};
use crate::BoxError;

/// Verdict of a beforeNavigate hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardResult {
    Proceed,
    Abort,
    /// Restart navigation at this path instead.
    Redirect(String),
}

impl From<bool> for GuardResult {
    fn from(proceed: bool) -> Self {
        if proceed {
            GuardResult::Proceed
        } else {
            GuardResult::Abort
        }
    }
}

/// Phase tag attached to every reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    Blocker,
    BeforeNavigate,
    OnNavigate,
    AfterNavigate,
}

impl HookPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            HookPhase::Blocker => "blocker",
            HookPhase::BeforeNavigate => "beforeNavigate",
            HookPhase::OnNavigate => "onNavigate",
            HookPhase::AfterNavigate => "afterNavigate",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One caught hook failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
    pub phase: HookPhase,
    pub navigation_id: u64,
    pub message: String,
}

type BeforeHook =
    dyn Fn(&NavigationContext) -> BoxFuture<'static, Result<GuardResult, BoxError>> + Send + Sync;
type OnHook = dyn Fn(&NavigationContext) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync;
type AfterHook = dyn Fn(&NavigationContext) + Send + Sync;
type DiagnosticListener = dyn Fn(&HookFailure) + Send + Sync;

/// Hook registries for one navigator.
#[derive(Debug, Default)]
pub struct NavigationLifecycle {
    before: ListenerRegistry<BeforeHook>,
    on: ListenerRegistry<OnHook>,
    after: ListenerRegistry<AfterHook>,
    diagnostics: ListenerRegistry<DiagnosticListener>,
}

impl NavigationLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a guard that may proceed, abort or redirect.
    pub fn on_before_navigate<F, Fut>(&self, hook: F) -> Subscription
    where
        F: Fn(&NavigationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<GuardResult, BoxError>> + Send + 'static,
    {
        self.before
            .register(Arc::new(move |ctx: &NavigationContext| hook(ctx).boxed()))
    }

    /// Register a hook run in order after loading, before commit.
    pub fn on_navigate<F, Fut>(&self, hook: F) -> Subscription
    where
        F: Fn(&NavigationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on
            .register(Arc::new(move |ctx: &NavigationContext| hook(ctx).boxed()))
    }

    /// Register an observer run after commit.
    pub fn after_navigate<F>(&self, hook: F) -> Subscription
    where
        F: Fn(&NavigationContext) + Send + Sync + 'static,
    {
        self.after.register(Arc::new(hook))
    }

    /// Register a listener for caught hook failures.
    pub fn on_diagnostic<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&HookFailure) + Send + Sync + 'static,
    {
        self.diagnostics.register(Arc::new(listener))
    }

    /// Run every beforeNavigate hook concurrently and fold their verdicts.
    pub async fn run_before(&self, ctx: &NavigationContext) -> GuardResult {
        let hooks = self.before.snapshot();
        if hooks.is_empty() {
            return GuardResult::Proceed;
        }

        let pending = hooks.iter().map(|hook| {
            let started = catch_unwind(AssertUnwindSafe(|| hook(ctx)));
            settle(started)
        });
        let results = join_all(pending).await;

        let mut aborted = false;
        let mut redirect = None;
        for result in results {
            match result {
                Ok(GuardResult::Proceed) => {}
                Ok(GuardResult::Abort) => aborted = true,
                Ok(GuardResult::Redirect(to)) => {
                    if redirect.is_none() {
                        redirect = Some(to);
                    }
                }
                Err(e) => {
                    self.report(HookPhase::BeforeNavigate, ctx.navigation_id, e.to_string());
                    aborted = true;
                }
            }
        }

        if aborted {
            GuardResult::Abort
        } else if let Some(to) = redirect {
            GuardResult::Redirect(to)
        } else {
            GuardResult::Proceed
        }
    }

    /// Run every onNavigate hook, one at a time.
    pub async fn run_on(&self, ctx: &NavigationContext) {
        for hook in self.on.snapshot() {
            let started = catch_unwind(AssertUnwindSafe(|| hook(ctx)));
            if let Err(e) = settle(started).await {
                self.report(HookPhase::OnNavigate, ctx.navigation_id, e.to_string());
            }
        }
    }

    /// Run every afterNavigate hook synchronously. Nothing is returned.
    pub fn run_after(&self, ctx: &NavigationContext) {
        for hook in self.after.snapshot() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| hook(ctx))) {
                self.report(
                    HookPhase::AfterNavigate,
                    ctx.navigation_id,
                    panic_message(payload),
                );
            }
        }
    }

    /// Send a failure to the diagnostics channel.
    pub fn report(&self, phase: HookPhase, navigation_id: u64, message: String) {
        tracing::error!(
            phase = %phase,
            navigation_id,
            error = %message,
            "Navigation hook failed"
        );
        metrics::record_hook_failure(phase.as_str());

        let failure = HookFailure {
            phase,
            navigation_id,
            message,
        };
        for listener in self.diagnostics.snapshot() {
            if catch_unwind(AssertUnwindSafe(|| listener(&failure))).is_err() {
                tracing::error!(phase = %phase, "Diagnostics listener panicked");
            }
        }
    }

    pub fn hook_counts(&self) -> (usize, usize, usize) {
        (self.before.len(), self.on.len(), self.after.len())
    }
}

pub(crate) async fn settle<T>(
    started: Result<BoxFuture<'static, Result<T, BoxError>>, Box<dyn Any + Send>>,
) -> Result<T, BoxError> {
    match started {
        Ok(pending) => match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(panic_message(payload).into()),
        },
        Err(payload) => Err(panic_message(payload).into()),
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::context::{Location, NavigationDirection, NavigationType};
    use crate::state::AppState;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn ctx() -> NavigationContext {
        NavigationContext {
            from: None,
            to: Location::parse("/target").unwrap(),
            navigation_type: NavigationType::Push,
            direction: NavigationDirection::Forward,
            navigation_id: 7,
            state: AppState::from("s"),
            route: "/target".to_string(),
            params: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_no_hooks_proceeds() {
        let lifecycle = NavigationLifecycle::new();
        assert_eq!(lifecycle.run_before(&ctx()).await, GuardResult::Proceed);
    }

    #[tokio::test]
    async fn test_abort_beats_redirect_in_any_order() {
        for abort_first in [true, false] {
            let lifecycle = NavigationLifecycle::new();
            let redirect = || async { Ok::<_, BoxError>(GuardResult::Redirect("/x".into())) };
            let abort = || async { Ok::<_, BoxError>(GuardResult::Abort) };
            if abort_first {
                let _a = lifecycle.on_before_navigate(move |_| abort());
                let _r = lifecycle.on_before_navigate(move |_| redirect());
            } else {
                let _r = lifecycle.on_before_navigate(move |_| redirect());
                let _a = lifecycle.on_before_navigate(move |_| abort());
            }
            assert_eq!(lifecycle.run_before(&ctx()).await, GuardResult::Abort);
        }
    }

    #[tokio::test]
    async fn test_first_registered_redirect_wins() {
        let lifecycle = NavigationLifecycle::new();
        let _p = lifecycle.on_before_navigate(|_| async { Ok(GuardResult::Proceed) });
        // The first redirect settles last but still wins.
        let _slow = lifecycle.on_before_navigate(|_| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(GuardResult::Redirect("/first".into()))
        });
        let _fast = lifecycle.on_before_navigate(|_| async { Ok(GuardResult::Redirect("/second".into())) });

        assert_eq!(
            lifecycle.run_before(&ctx()).await,
            GuardResult::Redirect("/first".into())
        );
    }

    #[tokio::test]
    async fn test_before_hooks_run_concurrently() {
        let lifecycle = NavigationLifecycle::new();
        let gate = Arc::new(Notify::new());

        let waiter = gate.clone();
        let _a = lifecycle.on_before_navigate(move |_| {
            let waiter = waiter.clone();
            async move {
                waiter.notified().await;
                Ok(GuardResult::Proceed)
            }
        });
        let opener = gate.clone();
        let _b = lifecycle.on_before_navigate(move |_| {
            let opener = opener.clone();
            async move {
                opener.notify_one();
                Ok(GuardResult::Proceed)
            }
        });

        let verdict = tokio::time::timeout(Duration::from_secs(1), lifecycle.run_before(&ctx()))
            .await
            .expect("before hooks must not run one after another");
        assert_eq!(verdict, GuardResult::Proceed);
    }

    #[tokio::test]
    async fn test_failing_before_hook_aborts_and_reports() {
        let lifecycle = NavigationLifecycle::new();
        let failures = Arc::new(Mutex::new(Vec::new()));
        let f = failures.clone();
        let _d = lifecycle.on_diagnostic(move |failure| f.lock().unwrap().push(failure.clone()));

        let sibling_done = Arc::new(AtomicUsize::new(0));
        let done = sibling_done.clone();
        let _err = lifecycle.on_before_navigate(|_| async { Err::<GuardResult, BoxError>("guard exploded".into()) });
        let _panics = lifecycle.on_before_navigate(|_| async {
            if true {
                panic!("guard panicked");
            }
            Ok(GuardResult::Proceed)
        });
        let _sibling = lifecycle.on_before_navigate(move |_| {
            let done = done.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(GuardResult::Redirect("/elsewhere".into()))
            }
        });

        assert_eq!(lifecycle.run_before(&ctx()).await, GuardResult::Abort);
        assert_eq!(sibling_done.load(Ordering::SeqCst), 1);

        let failures = failures.lock().unwrap();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| f.phase == HookPhase::BeforeNavigate && f.navigation_id == 7));
        assert_eq!(failures[0].message, "guard exploded");
        assert!(failures[1].message.contains("guard panicked"));
    }

    #[tokio::test]
    async fn test_on_hooks_are_sequential() {
        let lifecycle = NavigationLifecycle::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = log.clone();
        let _slow = lifecycle.on_navigate(move |_| {
            let l = l.clone();
            async move {
                l.lock().unwrap().push("slow:start");
                tokio::time::sleep(Duration::from_millis(30)).await;
                l.lock().unwrap().push("slow:end");
                Ok(())
            }
        });
        let l = log.clone();
        let _fast = lifecycle.on_navigate(move |_| {
            let l = l.clone();
            async move {
                l.lock().unwrap().push("fast");
                Ok(())
            }
        });

        lifecycle.run_on(&ctx()).await;
        assert_eq!(*log.lock().unwrap(), vec!["slow:start", "slow:end", "fast"]);
    }

    #[tokio::test]
    async fn test_failing_on_hook_does_not_stop_the_rest() {
        let lifecycle = NavigationLifecycle::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let f = failures.clone();
        let _d = lifecycle.on_diagnostic(move |failure| {
            assert_eq!(failure.phase, HookPhase::OnNavigate);
            f.fetch_add(1, Ordering::SeqCst);
        });

        let _bad = lifecycle.on_navigate(|_| async { Err::<(), BoxError>("analytics down".into()) });
        let r = ran.clone();
        let _good = lifecycle.on_navigate(move |_| {
            let r = r.clone();
            async move {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        lifecycle.run_on(&ctx()).await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_after_hooks_survive_panics() {
        let lifecycle = NavigationLifecycle::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let failures = Arc::new(AtomicUsize::new(0));
        let f = failures.clone();
        let _d = lifecycle.on_diagnostic(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });

        let _boom = lifecycle.after_navigate(|_| panic!("after hook"));
        let r = ran.clone();
        let _ok = lifecycle.after_navigate(move |c| {
            assert_eq!(c.to.pathname, "/target");
            r.fetch_add(1, Ordering::SeqCst);
        });

        lifecycle.run_after(&ctx());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_hooks_independently() {
        let lifecycle = NavigationLifecycle::new();
        let before = lifecycle.on_before_navigate(|_| async { Ok(GuardResult::Proceed) });
        let _on = lifecycle.on_navigate(|_| async { Ok(()) });
        let after = lifecycle.after_navigate(|_| {});
        assert_eq!(lifecycle.hook_counts(), (1, 1, 1));

        assert!(before.unsubscribe());
        assert!(after.unsubscribe());
        assert_eq!(lifecycle.hook_counts(), (0, 1, 0));
    }

    #[test]
    fn test_bool_into_guard() {
        assert_eq!(GuardResult::from(true), GuardResult::Proceed);
        assert_eq!(GuardResult::from(false), GuardResult::Abort);
    }
}
