use std::sync::Arc;

use amqp_mux_types::definitions::ChannelId;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, trace};

use super::Inner;
use crate::transport;

pub(crate) enum Running {
    Continue,
    Stop,
}

/// Pumps complete deliveries from the transport into the inbound queues of the
/// registered channels
#[derive(Debug)]
pub(crate) struct DispatchEngine {
    inner: Arc<Inner>,
}

impl DispatchEngine {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.event_loop())
    }

    #[instrument(name = "dispatch", skip_all)]
    async fn event_loop(self) {
        let shutdown = self.inner.shutdown.clone();
        loop {
            let running = tokio::select! {
                biased;
                _ = shutdown.cancelled() => Running::Stop,
                running = self.dispatch_once() => running,
            };
            match running {
                Running::Continue => {}
                Running::Stop => break,
            }
        }
        // Subscription loops end with the parent token
        shutdown.cancel();
        debug!("dispatch loop exiting");
    }

    async fn dispatch_once(&self) -> Running {
        let mut shared = self.inner.shared.lock().await;
        if shared.closed {
            return Running::Stop;
        }
        if shared.channels.is_empty() {
            drop(shared);
            self.inner.registered.notified().await;
            return Running::Continue;
        }

        let channels: Vec<ChannelId> = shared.channels.keys().copied().collect();
        shared.transport.release_buffers();
        match shared
            .transport
            .consume_message(&channels, self.inner.poll_interval)
            .await
        {
            Ok(Some(delivery)) => {
                let channel = delivery.channel;
                match shared.channels.get(&channel) {
                    Some(inbound) => {
                        trace!(channel, delivery_tag = delivery.delivery_tag, "dispatching");
                        if inbound.send(delivery).is_err() {
                            debug!(channel, "inbound queue is gone, dropping delivery");
                        }
                    }
                    None => debug!(channel, "no channel registered, dropping delivery"),
                }
                Running::Continue
            }
            Ok(None) => Running::Continue,
            Err(transport::Error::Closed) => Running::Stop,
            Err(err) => {
                debug!(%err, "consume_message failed");
                drop(shared);
                tokio::time::sleep(self.inner.poll_interval).await;
                Running::Continue
            }
        }
    }
}
