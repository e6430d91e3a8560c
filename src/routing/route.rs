//! Route declarations.
//!
//! A [`Route`] maps one path pattern to a lazily loaded component. Routes are
//! grouped per application state in [`StateRoutes`] and handed to
//! [`RouteMatcher`](crate::routing::RouteMatcher) for compilation.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use crate::state::AppState;
use crate::BoxError;

/// A loaded view component. The router never looks inside it.
#[derive(Clone)]
pub struct LoadedComponent(Arc<dyn Any + Send + Sync>);

impl LoadedComponent {
    pub fn new<T: Any + Send + Sync>(component: T) -> Self {
        Self(Arc::new(component))
    }

    /// Borrow the component as `T`, if that is what was loaded.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for LoadedComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LoadedComponent(..)")
    }
}

type LoaderFn = dyn Fn() -> BoxFuture<'static, Result<LoadedComponent, BoxError>> + Send + Sync;

/// Async factory for a route's component.
#[derive(Clone)]
pub struct ComponentLoader(Arc<LoaderFn>);

impl ComponentLoader {
    /// Wrap an async closure as a loader.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<LoadedComponent, BoxError>> + Send + 'static,
    {
        Self(Arc::new(move || f().boxed()))
    }

    /// A loader that resolves immediately with a clone of `component`.
    pub fn ready<T: Any + Send + Sync + Clone>(component: T) -> Self {
        Self::new(move || {
            let component = component.clone();
            async move { Ok(LoadedComponent::new(component)) }
        })
    }

    /// Start loading. This is the only place a navigation suspends.
    pub fn load(&self) -> BoxFuture<'static, Result<LoadedComponent, BoxError>> {
        (self.0)()
    }
}

impl fmt::Debug for ComponentLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComponentLoader(..)")
    }
}

/// One declared route.
#[derive(Debug, Clone)]
pub struct Route {
    /// Path pattern; unique within its state.
    pub path: String,
    pub loader: ComponentLoader,
    /// Layout this route renders inside, overriding the state's layout.
    pub layout: Option<String>,
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl Route {
    pub fn new(path: impl Into<String>, loader: ComponentLoader) -> Self {
        Self {
            path: path.into(),
            loader,
            layout: None,
            meta: serde_json::Map::new(),
        }
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }
}

/// Routes, redirects and defaults for one application state.
#[derive(Debug, Clone)]
pub struct StateRoutes {
    pub state: AppState,
    pub routes: Vec<Route>,
    /// Where to land when entering this state without an explicit path.
    pub default_path: Option<String>,
    /// Exact-path redirects, source to target.
    pub redirects: HashMap<String, String>,
    pub layout: Option<String>,
}

impl StateRoutes {
    pub fn new(state: impl Into<AppState>) -> Self {
        Self {
            state: state.into(),
            routes: Vec::new(),
            default_path: None,
            redirects: HashMap::new(),
            layout: None,
        }
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn default_path(mut self, path: impl Into<String>) -> Self {
        self.default_path = Some(path.into());
        self
    }

    pub fn redirect(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.redirects.insert(from.into(), to.into());
        self
    }

    pub fn layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = Some(layout.into());
        self
    }
}

/// Maps the component names used in configuration files to loaders.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    loaders: HashMap<String, ComponentLoader>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, loader: ComponentLoader) -> &mut Self {
        self.loaders.insert(name.into(), loader);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ComponentLoader> {
        self.loaders.get(name)
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ready_loader_yields_component() {
        let loader = ComponentLoader::ready("home");
        let component = loader.load().await.unwrap();
        assert_eq!(component.downcast_ref::<&str>(), Some(&"home"));
        assert!(component.downcast_ref::<String>().is_none());
    }

    #[tokio::test]
    async fn test_failing_loader() {
        let loader = ComponentLoader::new(|| async { Err::<LoadedComponent, BoxError>("chunk missing".into()) });
        let err = loader.load().await.unwrap_err();
        assert_eq!(err.to_string(), "chunk missing");
    }

    #[test]
    fn test_state_routes_builder() {
        let state = StateRoutes::new("authenticated")
            .route(Route::new("/dashboard", ComponentLoader::ready(())).with_layout("shell"))
            .default_path("/dashboard")
            .redirect("/home", "/dashboard");

        assert_eq!(state.state.as_str(), "authenticated");
        assert_eq!(state.routes[0].layout.as_deref(), Some("shell"));
        assert_eq!(state.redirects.get("/home").map(String::as_str), Some("/dashboard"));
    }
}
