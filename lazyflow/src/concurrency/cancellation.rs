//! Cooperative cancellation tokens.
//!
//! A [`CancellationToken`] is a monotonic stop flag. Long-running operations poll
//! [`CancellationToken::is_set`] or await [`CancellationToken::cancelled`] at their own
//! suspension points; nothing is ever interrupted forcibly.
//!
//! Tokens form a tree: a child created with [`ChildMode::Linked`] is set together with its
//! parent, while setting a child never affects the parent. Parents only hold weak references
//! to their children so a child is released as soon as its last holder drops it.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::watch;

/// How a child token relates to its parent.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChildMode {
    /// The child is set whenever the parent is set.
    Linked,
    /// The child shares no propagation with the parent.
    Independent,
}

#[derive(Debug)]
struct TokenInner {
    state: watch::Sender<bool>,
    children: Mutex<Vec<Weak<TokenInner>>>,
}

impl TokenInner {
    fn new() -> Self {
        let (state, _) = watch::channel(false);

        Self {
            state,
            children: Mutex::new(Vec::new()),
        }
    }

    fn set(&self) {
        let changed = self.state.send_if_modified(|set| {
            if *set {
                return false;
            }

            *set = true;
            true
        });

        if !changed {
            return;
        }

        let children = std::mem::take(
            &mut *self
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for child in children.iter().filter_map(Weak::upgrade) {
            child.set();
        }
    }

    fn is_set(&self) -> bool {
        *self.state.borrow()
    }
}

/// A propagatable, monotonic stop signal.
///
/// Clones share the same flag.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    /// Creates a token that is not set.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner::new()),
        }
    }

    /// Marks this token and every linked descendant as set.
    ///
    /// Setting an already set token has no effect.
    pub fn set(&self) {
        self.inner.set();
    }

    /// Returns whether the token has been set.
    pub fn is_set(&self) -> bool {
        self.inner.is_set()
    }

    /// Creates a child token.
    ///
    /// A [`ChildMode::Linked`] child created from a token that is already set starts out set.
    pub fn create_child(&self, mode: ChildMode) -> CancellationToken {
        let child = CancellationToken::new();
        if mode == ChildMode::Independent {
            return child;
        }

        {
            let mut children = self
                .inner
                .children
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            children.retain(|child| child.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }

        // The parent may have been set before the child was registered.
        if self.is_set() {
            child.set();
        }

        child
    }

    /// Returns a future that resolves once the token is set.
    ///
    /// The future owns a handle to the token and can be moved into spawned tasks.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        let token = self.clone();

        async move {
            let mut state = token.inner.state.subscribe();
            // The sender lives inside `token`, so the channel cannot close while we wait.
            let _ = state.wait_for(|set| *set).await;
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
