//! Flushes frames the core queued while applying a local mutation.

use std::sync::Mutex;

use canvas_core::Core;

use crate::error::SyncError;
use crate::lock;
use crate::transport::Transport;

/// Send every queued outbound frame, in order, until the core has none left.
///
/// The core lock is released between frames so a send never runs under it.
/// A frame the transport refuses goes back to the front of the core's queue,
/// so its optimistic transaction still reaches the relay on a later drain.
pub fn drain_pending<C, T>(core: &Mutex<C>, transport: &T) -> Result<usize, SyncError>
where
    C: Core,
    T: Transport + ?Sized,
{
    let mut sent = 0;
    loop {
        let Some(frame) = lock(core).drain_next_pending_outbound_frame() else {
            break;
        };
        if let Err(e) = transport.send(frame.clone()) {
            lock(core).requeue_pending_outbound_frame(frame);
            log::warn!("Send failed after {sent} frame(s), re-queued the rest: {e}");
            return Err(e.into());
        }
        sent += 1;
    }
    if sent > 0 {
        log::debug!("Drained {sent} pending command frame(s)");
    }
    Ok(sent)
}
