//! Cooperative cancellation for tree traversals.
//!
//! Every traversal holds a [`CancellationToken`] and polls it once per node
//! through a [`CancelCheck`]. A cancelled traversal stops immediately and its
//! partial state is dropped; the operation returns
//! [`SymtoolError::Cancelled`].

pub use tokio_util::sync::CancellationToken;

use symtool_core::error::{SymtoolError, SymtoolResult};
use symtool_core::syntax::VisitResult;
use tracing::debug;

/// Fail with `Cancelled` if the token has fired.
pub fn check(token: &CancellationToken) -> SymtoolResult<()> {
    if token.is_cancelled() {
        debug!("cancellation observed");
        Err(SymtoolError::Cancelled)
    } else {
        Ok(())
    }
}

/// Per-node cancellation check for visitors.
#[derive(Debug)]
pub struct CancelCheck<'t> {
    token: &'t CancellationToken,
    cancelled: bool,
}

impl<'t> CancelCheck<'t> {
    pub fn new(token: &'t CancellationToken) -> Self {
        CancelCheck {
            token,
            cancelled: false,
        }
    }

    /// Call from [`Visitor::enter_node`](symtool_core::syntax::Visitor::enter_node).
    pub fn poll(&mut self) -> VisitResult {
        if self.token.is_cancelled() {
            self.cancelled = true;
            VisitResult::Stop
        } else {
            VisitResult::Continue
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Convert a finished walk into a result, discarding `value` if the walk
    /// was cut short by cancellation.
    pub fn finish<T>(&self, value: T) -> SymtoolResult<T> {
        if self.cancelled {
            debug!("traversal cancelled; partial results dropped");
            Err(SymtoolError::Cancelled)
        } else {
            Ok(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_stops_after_cancel() {
        let token = CancellationToken::new();
        let mut guard = CancelCheck::new(&token);
        assert_eq!(guard.poll(), VisitResult::Continue);
        assert!(guard.finish(1).is_ok());
        token.cancel();
        assert_eq!(guard.poll(), VisitResult::Stop);
        assert!(matches!(guard.finish(1), Err(SymtoolError::Cancelled)));
        assert!(check(&token).is_err());
    }
}
