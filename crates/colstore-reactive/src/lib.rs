//! Reactive value containers for colstore.
//!
//! A [`Writable`] holds a value and a set of listeners. Every `set` or
//! `update` notifies the listeners synchronously, and a new listener is
//! called with the current value as soon as it subscribes. [`Readable`] is
//! the read-only view handed to consumers that must not write.

pub mod writable;

pub use writable::{ListenerFn, ListenerId, Readable, Unsubscriber, Writable};
