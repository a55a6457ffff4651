use tokio::sync::mpsc;

use super::{MinerEvent, Subscriber, SubscriberDeliveryError};

/// Subscriber backed by a bounded channel, drained by a connection task.
pub struct ChannelSubscriber {
    tx: mpsc::Sender<MinerEvent>,
}

impl ChannelSubscriber {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<MinerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl Subscriber for ChannelSubscriber {
    fn deliver(&self, event: &MinerEvent) -> Result<(), SubscriberDeliveryError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubscriberDeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => SubscriberDeliveryError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::broadcast::Broadcaster;
    use crate::domain::{LogEvent, LogLevel};

    #[test]
    fn full_and_closed_are_reported() {
        let (subscriber, rx) = ChannelSubscriber::new(1);
        let event = MinerEvent::Log(LogEvent::new(LogLevel::Info, "x"));

        assert!(subscriber.deliver(&event).is_ok());
        assert_eq!(subscriber.deliver(&event), Err(SubscriberDeliveryError::Full));

        drop(rx);
        assert_eq!(subscriber.deliver(&event), Err(SubscriberDeliveryError::Closed));
    }

    #[tokio::test]
    async fn closing_the_broadcaster_ends_the_receiver() {
        let broadcaster = Broadcaster::default();
        let (subscriber, mut rx) = ChannelSubscriber::new(4);
        broadcaster.subscribe(Arc::new(subscriber)).unwrap();

        assert!(matches!(rx.recv().await, Some(MinerEvent::Status(_))));
        assert_eq!(broadcaster.close(), 1);
        assert!(rx.recv().await.is_none());
    }
}
