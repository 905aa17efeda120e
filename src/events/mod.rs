//! Events Module
//!
//! Outbound webhook notifications.
//!
//! ## Flow
//! 1. An emitter (pipeline or catalog handler) calls `Notifier::notify`.
//! 2. `QueuedNotifier` enqueues a `deliver_event` task and returns at once.
//! 3. A worker runs `EventDispatcher::dispatch`, which POSTs the envelope to every
//!    active subscription of that owner that lists the event.
//!
//! Delivery is at most one attempt per event per subscription: no retries, no backoff,
//! no dead-letter queue. Failures are logged and counted in the `DeliveryReport`.

pub mod dispatcher;
pub mod handlers;
pub mod notifier;
pub mod types;
