use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use event_listener::Event;
use tracing::trace;

const DEFAULT_EVENT_ORDERING: Ordering = Ordering::SeqCst;

/// Sticky stop notification shared by the server and its background
/// collaborators. Once notified, every current and future listener returns.
#[derive(Debug)]
pub struct StopSignal {
    flag: AtomicBool,
    event: Event,
}

impl StopSignal {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self {
            flag: AtomicBool::new(false),
            event: Event::new(),
        })
    }

    pub fn is_set(&self) -> bool {
        self.flag.load(DEFAULT_EVENT_ORDERING)
    }

    /// wait until stop is requested
    pub async fn listen(&self) {
        if self.is_set() {
            trace!("before, stop is set");
            return;
        }

        let listener = self.event.listen();

        if self.is_set() {
            trace!("after, stop is set");
            return;
        }

        listener.await
    }

    pub fn notify(&self) {
        self.flag.store(true, DEFAULT_EVENT_ORDERING);
        self.event.notify(usize::MAX);
    }
}

#[cfg(test)]
mod test {

    use std::time::Duration;

    use fluvio_future::task::spawn;
    use fluvio_future::timer::sleep;

    use super::StopSignal;

    #[fluvio_future::test]
    async fn test_listen_after_notify() {
        let stop = StopSignal::shared();
        stop.notify();
        assert!(stop.is_set());
        // must not block
        stop.listen().await;
    }

    #[fluvio_future::test]
    async fn test_wakes_listener() {
        let stop = StopSignal::shared();
        let waiter = stop.clone();
        let handle = spawn(async move {
            waiter.listen().await;
            true
        });
        sleep(Duration::from_millis(10)).await;
        stop.notify();
        assert!(handle.await);
    }
}
