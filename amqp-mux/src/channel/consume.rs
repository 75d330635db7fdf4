use amqp_mux_types::Delivery;
use async_trait::async_trait;

use super::Channel;

/// Handles the deliveries of a [`Channel::consume`] loop
///
/// The handler is invoked once per delivery, in delivery order, and the next
/// delivery is not taken until it returns.
#[async_trait]
pub trait Consume: Send {
    /// Handle one delivery
    async fn consume(&mut self, channel: &Channel, delivery: Delivery);
}

/// A [`Consume`] handler that only observes deliveries
///
/// Created with [`observe`].
#[derive(Debug, Clone)]
pub struct Observe<F>(F);

/// Wraps a closure into a [`Consume`] handler
///
/// # Example
///
/// ```rust
/// use amqp_mux::{observe, Channel};
///
/// let handler = observe(|channel: &Channel, delivery| {
///     println!("{} received {:?}", channel.id(), delivery);
/// });
/// # let _ = handler;
/// ```
pub fn observe<F>(f: F) -> Observe<F>
where
    F: FnMut(&Channel, Delivery) + Send,
{
    Observe(f)
}

#[async_trait]
impl<F> Consume for Observe<F>
where
    F: FnMut(&Channel, Delivery) + Send,
{
    async fn consume(&mut self, channel: &Channel, delivery: Delivery) {
        (self.0)(channel, delivery)
    }
}

#[async_trait]
impl<T> Consume for &mut T
where
    T: Consume + ?Sized,
{
    async fn consume(&mut self, channel: &Channel, delivery: Delivery) {
        (**self).consume(channel, delivery).await
    }
}
