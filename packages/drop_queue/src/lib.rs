//! This package provides [`DropQueue`], a per-thread queue of objects whose destruction
//! has been deferred until the current dispatch turn has unwound.
//!
//! Event-driven workers frequently need to destroy an object from a call stack that the
//! object itself may still be participating in (for example, tearing down a connection
//! pool from inside a callback that the pool invoked). Destroying such an object
//! synchronously risks use-after-free-style logic errors even in safe code: iterators
//! over the object's owner are invalidated, callback lists mutate mid-walk, and so on.
//!
//! The queue breaks this knot. Ownership of the object is handed to the queue via the
//! [`DeferDrop`] trait and the object is destroyed later, when the worker's event loop
//! regains control and calls [`flush()`][DropQueue::flush] between turns.
//!
//! # Example
//!
//! ```rust
//! use drop_queue::{DeferDrop, DropQueue};
//!
//! let queue = DropQueue::new();
//!
//! // Hand an object over; it stays alive until the next flush.
//! queue.defer_drop(Box::new("connection state".to_string()));
//! assert_eq!(queue.len(), 1);
//!
//! // Between dispatch turns, the worker drains the queue.
//! let dropped = queue.flush();
//! assert_eq!(dropped, 1);
//! assert!(queue.is_empty());
//! ```
//!
//! # Single-threaded design
//!
//! The queue is a per-worker-thread object in a shared-nothing architecture. It is
//! neither [`Send`] nor [`Sync`]; clones of a [`DropQueue`] are cheap handles to the
//! same underlying queue on the same thread.

mod queue;

pub use queue::*;
