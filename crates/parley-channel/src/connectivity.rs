use tokio::sync::broadcast;
use tracing::warn;

/// Host network reachability as reported by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

/// Fan-out point for platform connectivity signals.
///
/// The host publishes; each channel holds a [`ConnectivitySubscription`] and
/// drops it on disconnect.
#[derive(Clone, Debug)]
pub struct ConnectivityMonitor {
    tx: broadcast::Sender<Connectivity>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(16);
        Self { tx }
    }

    /// Publish a signal. Returns how many subscribers it reached.
    pub fn publish(&self, signal: Connectivity) -> usize {
        self.tx.send(signal).unwrap_or(0)
    }

    pub fn subscribe(&self) -> ConnectivitySubscription {
        ConnectivitySubscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[derive(Debug)]
pub struct ConnectivitySubscription {
    rx: broadcast::Receiver<Connectivity>,
}

impl ConnectivitySubscription {
    /// Next signal, or `None` once every monitor handle is gone.
    pub async fn next(&mut self) -> Option<Connectivity> {
        loop {
            match self.rx.recv().await {
                Ok(signal) => return Some(signal),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "connectivity subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_signals_in_order() {
        let monitor = ConnectivityMonitor::new();
        let mut sub = monitor.subscribe();
        assert_eq!(monitor.publish(Connectivity::Offline), 1);
        monitor.publish(Connectivity::Online);
        assert_eq!(sub.next().await, Some(Connectivity::Offline));
        assert_eq!(sub.next().await, Some(Connectivity::Online));
    }

    #[tokio::test]
    async fn dropping_monitor_ends_subscription() {
        let monitor = ConnectivityMonitor::new();
        let mut sub = monitor.subscribe();
        drop(monitor);
        assert_eq!(sub.next().await, None);
    }

    #[test]
    fn dropping_subscription_unregisters() {
        let monitor = ConnectivityMonitor::new();
        let sub = monitor.subscribe();
        assert_eq!(monitor.subscriber_count(), 1);
        drop(sub);
        assert_eq!(monitor.subscriber_count(), 0);
        assert_eq!(monitor.publish(Connectivity::Online), 0);
    }
}
