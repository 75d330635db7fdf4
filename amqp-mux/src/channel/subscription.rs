use tracing::{debug, trace};

use super::{Channel, Consume};
use crate::Error;

/// Feeds the channel's inbound queue to `handler` until the channel is
/// cancelled or the connection goes away
pub(super) async fn run<H>(channel: &Channel, handler: &mut H) -> Result<(), Error>
where
    H: Consume + ?Sized,
{
    // Only one loop drains a channel at a time
    let mut inbound = channel.inbound_rx.lock().await;

    loop {
        let delivery = tokio::select! {
            biased;
            _ = channel.cancel.cancelled() => {
                return if channel.shutdown.is_cancelled() {
                    debug!(channel = channel.id, "connection shut down");
                    Err(Error::ConnectionClosed)
                } else {
                    debug!(channel = channel.id, "consumer cancelled");
                    Ok(())
                };
            }
            delivery = inbound.recv() => delivery,
        };

        match delivery {
            Some(delivery) => {
                trace!(
                    channel = channel.id,
                    delivery_tag = delivery.delivery_tag,
                    "handling delivery"
                );
                handler.consume(channel, delivery).await;
            }
            // The channel itself holds a sender, this only happens while it is
            // being torn down
            None => return Err(Error::ConnectionClosed),
        }
    }
}
