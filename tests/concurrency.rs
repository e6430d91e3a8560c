//! Overlapping navigations and state changes during in-flight attempts.

use std::sync::{Arc, Mutex};

use futures_util::future::FutureExt;
use tokio::sync::Notify;

use state_router::lifecycle::{GuardResult, NavigationContext, NavigationDirection, NavigationType};
use state_router::navigation::{
    AutoConfirm, BlockerRegistry, HistoryProvider, NavigateOptions, NavigationErrorCode,
};
use state_router::routing::{Route, StateRoutes};
use state_router::BoxError;

mod common;
use common::{auth_states, route, within, Gate, Harness};

fn gated_table(gates: &[(&str, &Gate)]) -> Vec<StateRoutes> {
    let mut authed = StateRoutes::new("authenticated")
        .route(route("/dashboard"))
        .route(route("/settings"))
        .default_path("/dashboard");
    for (path, gate) in gates {
        authed = authed.route(Route::new(*path, gate.loader(path)));
    }
    vec![
        StateRoutes::new("unauthenticated")
            .route(route("/login"))
            .default_path("/login"),
        authed,
    ]
}

#[tokio::test]
async fn test_newer_navigation_wins_over_slow_one() {
    let slow = Gate::new();
    let h = Harness::new("authenticated", gated_table(&[("/reports", &slow)]));

    let nav = h.navigator.clone();
    let first = tokio::spawn(async move { nav.navigate("/reports", NavigateOptions::default()).await });
    within(slow.started.notified()).await;
    assert!(h.navigator.page_state().is_navigating);

    let second = within(h.navigator.navigate("/settings", NavigateOptions::default()))
        .await
        .unwrap();
    assert_eq!(h.navigator.page_state().pathname, "/settings");

    slow.release.notify_one();
    let err = within(first).await.unwrap().unwrap_err();
    assert_eq!(err.code(), NavigationErrorCode::Cancelled);

    let page = h.navigator.page_state();
    assert_eq!(page.pathname, "/settings");
    assert!(page.error.is_none(), "cancellation never writes an error");
    assert!(!page.is_navigating);
    assert_eq!(h.render.paths(), vec!["/settings"]);
    assert_eq!(h.history.history_state().unwrap().navigation_id, second.context.navigation_id);
    assert!(h.events.codes().is_empty(), "cancellation is not reported as an error");
}

#[tokio::test]
async fn test_superseded_attempt_leaves_is_navigating_to_the_latest() {
    let first_gate = Gate::new();
    let second_gate = Gate::new();
    let h = Harness::new(
        "authenticated",
        gated_table(&[("/a", &first_gate), ("/b", &second_gate)]),
    );

    let nav = h.navigator.clone();
    let first = tokio::spawn(async move { nav.navigate("/a", NavigateOptions::default()).await });
    within(first_gate.started.notified()).await;

    let nav = h.navigator.clone();
    let second = tokio::spawn(async move { nav.navigate("/b", NavigateOptions::default()).await });
    within(second_gate.started.notified()).await;

    first_gate.release.notify_one();
    let err = within(first).await.unwrap().unwrap_err();
    assert_eq!(err.code(), NavigationErrorCode::Cancelled);
    assert!(
        h.navigator.page_state().is_navigating,
        "the superseded attempt must not clear the flag of the newer one"
    );

    second_gate.release.notify_one();
    let done = within(second).await.unwrap().unwrap();
    assert_eq!(done.context.to.pathname, "/b");
    assert!(!h.navigator.page_state().is_navigating);
}

#[tokio::test]
async fn test_state_change_during_load_cancels() {
    let slow = Gate::new();
    let h = Harness::new("authenticated", gated_table(&[("/reports", &slow)]));
    h.navigator.navigate("/dashboard", NavigateOptions::default()).await.unwrap();

    let nav = h.navigator.clone();
    let pending = tokio::spawn(async move { nav.navigate("/reports", NavigateOptions::default()).await });
    within(slow.started.notified()).await;

    h.states.set_state("unauthenticated");
    slow.release.notify_one();
    let err = within(pending).await.unwrap().unwrap_err();
    assert_eq!(err.code(), NavigationErrorCode::Cancelled);

    let page = h.navigator.page_state();
    assert_eq!(page.pathname, "/dashboard");
    assert!(page.error.is_none());
    assert!(!page.is_navigating);
    assert_eq!(h.render.paths(), vec!["/dashboard"]);

    let done = h
        .navigator
        .navigate_after_state_change("unauthenticated", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.context.to.pathname, "/login");
}

#[tokio::test]
async fn test_same_value_state_change_still_cancels() {
    let slow = Gate::new();
    let h = Harness::new("authenticated", gated_table(&[("/reports", &slow)]));

    let nav = h.navigator.clone();
    let pending = tokio::spawn(async move { nav.navigate("/reports", NavigateOptions::default()).await });
    within(slow.started.notified()).await;

    h.states.set_state("authenticated");
    slow.release.notify_one();
    let err = within(pending).await.unwrap().unwrap_err();
    assert_eq!(err.code(), NavigationErrorCode::Cancelled);
}

#[tokio::test]
async fn test_navigation_overtaken_during_on_navigate_hooks() {
    let h = Harness::new("authenticated", gated_table(&[]));
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let (e, r) = (entered.clone(), release.clone());
    let _hook = h.navigator.lifecycle().on_navigate(move |ctx: &NavigationContext| {
        let hold = ctx.to.pathname == "/dashboard";
        let (e, r) = (e.clone(), r.clone());
        async move {
            if hold {
                e.notify_one();
                r.notified().await;
            }
            Ok::<_, BoxError>(())
        }
    });

    let nav = h.navigator.clone();
    let first = tokio::spawn(async move { nav.navigate("/dashboard", NavigateOptions::default()).await });
    within(entered.notified()).await;

    within(h.navigator.navigate("/settings", NavigateOptions::default()))
        .await
        .unwrap();
    release.notify_one();

    let err = within(first).await.unwrap().unwrap_err();
    assert_eq!(err.code(), NavigationErrorCode::Cancelled);
    assert_eq!(h.render.paths(), vec!["/settings"]);
    assert_eq!(h.navigator.page_state().pathname, "/settings");
}

#[tokio::test]
async fn test_navigation_ids_increase_in_start_order() {
    let h = Harness::auth("authenticated");
    let ids = Arc::new(Mutex::new(Vec::new()));
    let i = ids.clone();
    let _after = h
        .navigator
        .lifecycle()
        .after_navigate(move |ctx| i.lock().unwrap().push(ctx.navigation_id));

    for path in ["/dashboard", "/settings", "/users/1", "/home"] {
        h.navigator.navigate(path, NavigateOptions::default()).await.unwrap();
    }
    let ids = ids.lock().unwrap();
    assert_eq!(ids.len(), 4);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_superseded_hook_redirect_does_not_restart() {
    let tables = vec![StateRoutes::new("s")
        .route(route("/a"))
        .route(route("/b"))
        .route(route("/c"))];
    let h = Harness::new("s", tables);
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let (e, r) = (entered.clone(), release.clone());
    let _guard = h.navigator.lifecycle().on_before_navigate(move |ctx: &NavigationContext| {
        let hold = ctx.to.pathname == "/a";
        let (e, r) = (e.clone(), r.clone());
        async move {
            if hold {
                e.notify_one();
                r.notified().await;
                return Ok::<_, BoxError>(GuardResult::Redirect("/c".into()));
            }
            Ok(GuardResult::Proceed)
        }
    });

    let nav = h.navigator.clone();
    let older = tokio::spawn(async move { nav.navigate("/a", NavigateOptions::default()).await });
    within(entered.notified()).await;

    within(h.navigator.navigate("/b", NavigateOptions::default()))
        .await
        .unwrap();
    release.notify_one();

    let err = within(older).await.unwrap().unwrap_err();
    assert_eq!(err.code(), NavigationErrorCode::Cancelled);
    assert_eq!(err.path(), "/a");

    let page = h.navigator.page_state();
    assert_eq!(page.pathname, "/b");
    assert!(!page.is_navigating);
    assert_eq!(h.render.paths(), vec!["/b"]);
    assert_eq!(h.history.hrefs(), vec!["/", "/b"]);
}

#[tokio::test]
async fn test_superseded_refused_pop_leaves_history_alone() {
    let blockers = Arc::new(BlockerRegistry::new(Arc::new(AutoConfirm::reject())));
    let b = blockers.clone();
    let h = Harness::with("authenticated", auth_states(), move |builder| builder.blockers(b));
    h.navigator.navigate("/dashboard", NavigateOptions::default()).await.unwrap();
    h.navigator.navigate("/settings", NavigateOptions::default()).await.unwrap();
    let _dirty = blockers.block("Discard changes?", |ctx: &NavigationContext| {
        ctx.navigation_type == NavigationType::Pop
    });

    h.navigator.back();
    let asked = Arc::new(Notify::new());
    let answer = Arc::new(Notify::new());
    let (a, r) = (asked.clone(), answer.clone());
    let nav = h.navigator.clone();
    let entry = h.history.history_state();
    let pop = tokio::spawn(async move {
        nav.handle_pop_state(
            entry,
            NavigationDirection::Back,
            Some(Box::new(move |_ctx: &NavigationContext| {
                async move {
                    a.notify_one();
                    r.notified().await;
                    false
                }
                .boxed()
            })),
        )
        .await
    });
    within(asked.notified()).await;

    within(h.navigator.navigate("/users/1", NavigateOptions::default()))
        .await
        .unwrap();
    answer.notify_one();

    let err = within(pop).await.unwrap().unwrap_err();
    assert_eq!(err.code(), NavigationErrorCode::Cancelled);
    assert_eq!(h.history.hrefs(), vec!["/", "/dashboard", "/users/1"]);
    assert_eq!(h.history.index(), 2);
    assert_eq!(h.navigator.page_state().pathname, "/users/1");
    assert!(h.navigator.page_state().error.is_none());

    // No undo was issued, so the next pop is handled normally.
    h.navigator.back();
    let done = within(h.navigator.handle_pop_state(
        h.history.history_state(),
        NavigationDirection::Back,
        Some(Box::new(|_ctx: &NavigationContext| async { true }.boxed())),
    ))
    .await
    .unwrap();
    assert_eq!(done.context.to.pathname, "/dashboard");
}
