//! Shared fixtures for navigation integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use state_router::lifecycle::NavigationContext;
use state_router::navigation::{
    MemoryHistory, MemoryStorage, NavigationError, NavigationEvents, Navigator, RenderCommit,
    RenderSink, ScrollPosition,
};
use state_router::routing::{ComponentLoader, LoadedComponent, Route, RouteMatcher, StateRoutes};
use state_router::state::StateMachine;
use state_router::BoxError;

/// The component every test loader produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page(pub String);

pub fn page(name: &str) -> ComponentLoader {
    ComponentLoader::ready(Page(name.to_string()))
}

pub fn route(path: &str) -> Route {
    Route::new(path, page(path))
}

/// Controls a loader that waits until released.
#[derive(Clone, Default)]
pub struct Gate {
    pub started: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader that signals `started`, then waits for `release`.
    pub fn loader(&self, name: &str) -> ComponentLoader {
        let gate = self.clone();
        let name = name.to_string();
        ComponentLoader::new(move || {
            let gate = gate.clone();
            let name = name.clone();
            async move {
                gate.started.notify_one();
                gate.release.notified().await;
                Ok::<_, BoxError>(LoadedComponent::new(Page(name)))
            }
        })
    }
}

pub fn failing_loader(message: &'static str) -> ComponentLoader {
    ComponentLoader::new(move || async move { Err::<LoadedComponent, BoxError>(message.into()) })
}

/// Records everything the navigator hands to the renderer.
#[derive(Default)]
pub struct RecordingRender {
    pub rendered: Mutex<Vec<(String, Option<String>)>>,
    pub scroll: Mutex<Option<ScrollPosition>>,
    pub restored: Mutex<Vec<ScrollPosition>>,
}

impl RecordingRender {
    pub fn paths(&self) -> Vec<String> {
        self.rendered.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn scroll_to(&self, y: f64) {
        *self.scroll.lock().unwrap() = Some(ScrollPosition { x: 0.0, y });
    }
}

impl RenderSink for RecordingRender {
    fn render(&self, commit: &RenderCommit) {
        let name = commit
            .component
            .downcast_ref::<Page>()
            .map(|p| p.0.clone())
            .unwrap_or_default();
        assert!(!name.is_empty(), "render received an unknown component");
        self.rendered
            .lock()
            .unwrap()
            .push((commit.context.to.pathname.clone(), commit.layout.clone()));
    }

    fn scroll_position(&self) -> Option<ScrollPosition> {
        *self.scroll.lock().unwrap()
    }

    fn restore_scroll(&self, position: ScrollPosition) {
        self.restored.lock().unwrap().push(position);
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    pub errors: Mutex<Vec<(String, bool)>>,
    pub completed: Mutex<Vec<String>>,
}

impl RecordingEvents {
    /// Codes of reported errors, in order.
    pub fn codes(&self) -> Vec<String> {
        self.errors.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }
}

impl NavigationEvents for RecordingEvents {
    fn on_error(&self, error: &NavigationError, ctx: Option<&NavigationContext>) {
        self.errors
            .lock()
            .unwrap()
            .push((error.code().as_str().to_string(), ctx.is_some()));
    }

    fn on_complete(&self, ctx: &NavigationContext) {
        self.completed.lock().unwrap().push(ctx.to.pathname.clone());
    }
}

/// The usual three-state table: initializing, unauthenticated, authenticated.
pub fn auth_states() -> Vec<StateRoutes> {
    vec![
        StateRoutes::new("initializing"),
        StateRoutes::new("unauthenticated")
            .route(route("/login"))
            .route(route("/signup"))
            .default_path("/login"),
        StateRoutes::new("authenticated")
            .route(route("/dashboard"))
            .route(route("/users/[id]"))
            .route(route("/users/new"))
            .route(route("/files/[...path]"))
            .route(route("/settings").with_layout("settings-shell"))
            .default_path("/dashboard")
            .redirect("/home", "/dashboard")
            .layout("app-shell"),
    ]
}

pub struct Harness {
    pub navigator: Arc<Navigator>,
    pub states: Arc<StateMachine>,
    pub history: Arc<MemoryHistory>,
    pub storage: Arc<MemoryStorage>,
    pub render: Arc<RecordingRender>,
    pub events: Arc<RecordingEvents>,
}

impl Harness {
    pub fn new(initial_state: &str, tables: Vec<StateRoutes>) -> Self {
        Self::with(initial_state, tables, |builder| builder)
    }

    /// Build with extra builder configuration applied last.
    pub fn with<F>(initial_state: &str, tables: Vec<StateRoutes>, configure: F) -> Self
    where
        F: FnOnce(state_router::navigation::NavigatorBuilder) -> state_router::navigation::NavigatorBuilder,
    {
        let states = Arc::new(StateMachine::new(initial_state));
        let history = Arc::new(MemoryHistory::new("/"));
        let storage = Arc::new(MemoryStorage::new(50));
        let render = Arc::new(RecordingRender::default());
        let events = Arc::new(RecordingEvents::default());

        let builder = Navigator::builder(RouteMatcher::new(tables).unwrap(), states.clone())
            .history(history.clone())
            .storage(storage.clone())
            .render(render.clone())
            .events(events.clone());
        let navigator = Arc::new(configure(builder).build());

        Self {
            navigator,
            states,
            history,
            storage,
            render,
            events,
        }
    }

    pub fn auth(initial_state: &str) -> Self {
        Self::new(initial_state, auth_states())
    }
}

/// Fail the test instead of hanging on a stuck navigation.
pub async fn within<F: std::future::Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("timed out")
}
