//! Real-time event distribution for toggo.
//!
//! Poll events are published to Redis Pub/Sub so that every server instance
//! (and any connected client gateway) sees changes to a trip's polls.

pub mod pubsub;

pub use pubsub::{RedisPubSub, trip_channel};
