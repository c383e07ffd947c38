use crate::event::FeedEvent;
use crate::subscription::FeedSubscription;
use futures::Stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::warn;

/// Async [`Stream`] of event batches from a [`FeedSubscription`].
///
/// Each inbound listener batch is forwarded as one `Vec<FeedEvent>`, preserving the
/// subscription's per-source ordering. Dropping the stream unregisters the forwarding
/// listener; dropping the receiver first disables forwarding without affecting other
/// listeners of the subscription.
pub struct EventBatchStream {
    inner: UnboundedReceiverStream<Vec<FeedEvent>>,
    subscription: FeedSubscription,
    listener_id: u64,
}

impl EventBatchStream {
    /// Attach a batch stream to the subscription.
    pub fn new(subscription: &FeedSubscription) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let sender = Arc::new(Mutex::new(Some(tx)));
        let sender_in_listener = Arc::clone(&sender);

        let listener_id = subscription.add_event_listener(move |events| {
            let mut held = sender_in_listener.lock();

            let Some(tx) = held.as_ref() else {
                return;
            };

            if tx.send(events.to_vec()).is_err() {
                warn!("event stream receiver dropped - batches will no longer be forwarded");
                *held = None;
            }
        });

        Self {
            inner: UnboundedReceiverStream::new(rx),
            subscription: subscription.clone(),
            listener_id,
        }
    }
}

impl Stream for EventBatchStream {
    type Item = Vec<FeedEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for EventBatchStream {
    fn drop(&mut self) {
        self.subscription.remove_event_listener(self.listener_id);
    }
}

impl std::fmt::Debug for EventBatchStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBatchStream")
            .field("subscription", &self.subscription)
            .field("listener_id", &self.listener_id)
            .finish()
    }
}

impl FeedSubscription {
    /// An async stream over this subscription's delivered batches.
    pub fn batch_stream(&self) -> EventBatchStream {
        EventBatchStream::new(self)
    }
}
