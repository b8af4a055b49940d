//! Blocking adapter
//!
//! Turns "not ready yet" into a suspension for blocking sockets and into
//! `EWOULDBLOCK` for non-blocking ones. The waiter captures its socket's
//! creation id on entry; each round it drains completions and then checks,
//! in order:
//!
//! 1. the slot was closed, recycled or is being closed: `ECANCELED`
//! 2. the socket went to `FatalError` while waiting: transport error
//! 3. the caller's readiness condition
//!
//! Between rounds it parks on the completion queue's epoch for at most one
//! park interval, so engines that need `poll()` still make progress.

use coopsock_core::{CreationId, Errno, SockError, SockResult, SocketHandle, TransportEngine};

use crate::layer::{Inner, SocketLayer};
use crate::stats::bump;

impl<E: TransportEngine> SocketLayer<E> {
    /// Run `ready` until it yields a result.
    ///
    /// `ready` sees the table with every completion applied and returns
    /// `None` while the condition does not hold.
    pub(crate) fn wait_on<T>(
        &self,
        h: SocketHandle,
        creation: CreationId,
        blocking: bool,
        mut ready: impl FnMut(&mut Inner) -> Option<SockResult<T>>,
    ) -> SockResult<T> {
        loop {
            let seen = self.queue.epoch();
            {
                let mut inner = self.enter();
                let scb = inner.table.get(h).ok_or(SockError::bad_handle())?;

                if scb.creation != creation || !scb.state.is_allocated() || scb.close_pending {
                    return Err(SockError::cancelled());
                }
                if scb.state.is_fatal() {
                    return Err(SockError::transport(scb.fatal_errno.unwrap_or(Errno::EIO)));
                }
                if let Some(result) = ready(&mut *inner) {
                    return result;
                }
            }

            if !blocking {
                return Err(SockError::would_block());
            }
            bump(&self.stats.parks, 1);
            self.queue.park(seen, self.config.park_interval);
        }
    }
}
