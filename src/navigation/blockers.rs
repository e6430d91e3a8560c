//! Navigation blockers backed by a confirmation dialog.
//!
//! A blocker is a predicate over the pending [`NavigationContext`] plus the
//! message shown when it fires. When one or more blockers fire, their
//! messages are joined and the user is asked once.

use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};

use crate::lifecycle::NavigationContext;
use crate::navigation::providers::{BlockerCheck, BlockerVerdict, ConfirmDialog};
use crate::subscription::{ListenerRegistry, Subscription};
use crate::BoxError;

struct Blocker {
    message: String,
    when: Box<dyn Fn(&NavigationContext) -> bool + Send + Sync>,
}

/// Registry of active blockers for one navigator.
pub struct BlockerRegistry {
    blockers: ListenerRegistry<Blocker>,
    dialog: Arc<dyn ConfirmDialog>,
}

impl BlockerRegistry {
    pub fn new(dialog: Arc<dyn ConfirmDialog>) -> Self {
        Self {
            blockers: ListenerRegistry::new(),
            dialog,
        }
    }

    /// Block navigations for which `when` returns true, e.g. while a form
    /// has unsaved changes.
    pub fn block<F>(&self, message: impl Into<String>, when: F) -> Subscription
    where
        F: Fn(&NavigationContext) -> bool + Send + Sync + 'static,
    {
        self.blockers.register(Arc::new(Blocker {
            message: message.into(),
            when: Box::new(when),
        }))
    }

    /// Messages of every blocker that fires for `ctx`.
    pub fn active(&self, ctx: &NavigationContext) -> Vec<String> {
        self.blockers
            .snapshot()
            .iter()
            .filter(|b| (b.when)(ctx))
            .map(|b| b.message.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.blockers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blockers.is_empty()
    }
}

impl std::fmt::Debug for BlockerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockerRegistry")
            .field("blockers", &self.blockers.len())
            .finish()
    }
}

impl BlockerCheck for BlockerRegistry {
    fn check_blockers(
        &self,
        ctx: &NavigationContext,
    ) -> BoxFuture<'static, Result<BlockerVerdict, BoxError>> {
        let messages = self.active(ctx);
        if messages.is_empty() {
            return future::ready(Ok(BlockerVerdict { proceed: true })).boxed();
        }

        tracing::debug!(
            navigation_id = ctx.navigation_id,
            blockers = messages.len(),
            "Asking to confirm blocked navigation"
        );
        let answer = self.dialog.confirm(&messages.join("\n"));
        async move {
            Ok(BlockerVerdict {
                proceed: answer.await,
            })
        }
        .boxed()
    }
}

/// A dialog that always gives the same answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoConfirm {
    pub answer: bool,
}

impl AutoConfirm {
    pub fn accept() -> Self {
        Self { answer: true }
    }

    pub fn reject() -> Self {
        Self { answer: false }
    }
}

impl ConfirmDialog for AutoConfirm {
    fn confirm(&self, message: &str) -> BoxFuture<'static, bool> {
        tracing::debug!(answer = self.answer, message, "Auto-answering confirmation");
        future::ready(self.answer).boxed()
    }
}
