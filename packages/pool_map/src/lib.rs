//! This package provides [`PoolMap`], a keyed container of lazily created connection
//! pools, built for the upstream side of a network proxy.
//!
//! A proxy worker often multiplexes outbound connections across destinations that
//! differ along some dimension - priority, hash, protocol variant. For each unique key
//! the map constructs a distinct pool on first use and owns it from then on; later
//! lookups with an equal key return the same pool. The map itself is protocol-agnostic:
//! pools are opaque objects satisfying the small [`DrainablePool`] capability set.
//!
//! On top of lazy creation with stable identity, the map mediates two lifecycle
//! concerns:
//!
//! - **Drain fan-out and drained fan-in.** [`drain_connections()`][1] forwards a drain
//!   request to every owned pool. [`add_drained_callback()`][2] registers a subscriber
//!   notification on every pool the map owns - present or future - so subscribers hear
//!   about each pool that reaches the fully drained state.
//! - **Capacity-bounded admission.** An optional limit caps the number of pools. When
//!   the limit is reached, admitting a new key evicts one idle pool; if every pool is
//!   busy the admission is refused and [`get_or_create()`][3] returns `None`.
//!
//! Pools are never destroyed synchronously inside a map operation. Eviction, `clear`,
//! and the map's own destruction all hand ownership to a [`DeferDrop`] dispatcher (in
//! practice a [`drop_queue::DropQueue`]) so that a pool's destructor cannot observe the
//! map mid-operation.
//!
//! # Example
//!
//! ```rust
//! use drop_queue::DropQueue;
//! use pool_map::{DrainablePool, DrainedCallback, PoolMap};
//!
//! /// Minimal pool for the sake of the example.
//! #[derive(Default)]
//! struct HttpPool {
//!     drained_callbacks: Vec<DrainedCallback>,
//! }
//!
//! impl DrainablePool for HttpPool {
//!     fn has_active_connections(&self) -> bool {
//!         false
//!     }
//!
//!     fn drain_connections(&mut self) {}
//!
//!     fn add_drained_callback(&mut self, callback: DrainedCallback) {
//!         self.drained_callbacks.push(callback);
//!     }
//! }
//!
//! let queue = DropQueue::new();
//! let map = PoolMap::<u32, HttpPool>::new(queue.clone());
//!
//! // First use of a key creates the pool.
//! let pool = map.get_or_create(1, HttpPool::default);
//! assert!(pool.is_some());
//! drop(pool);
//!
//! // Later use of an equal key returns the same pool; the factory is not invoked.
//! let same = map.get_or_create(1, || unreachable!("key already present"));
//! assert!(same.is_some());
//! drop(same);
//!
//! assert_eq!(map.len(), 1);
//!
//! // Resetting the map defers pool destruction to the queue.
//! map.clear();
//! assert_eq!(map.len(), 0);
//! assert_eq!(queue.len(), 1);
//! queue.flush();
//! ```
//!
//! # Single-threaded design
//!
//! The map is one of many per-worker-thread objects in a shared-nothing architecture.
//! It is neither [`Send`] nor [`Sync`], holds no locks, and completes every operation
//! synchronously on the calling thread. Re-entering the map from a callback fired
//! inside one of its own operations is forbidden and panics in debug builds.
//!
//! [1]: PoolMap::drain_connections
//! [2]: PoolMap::add_drained_callback
//! [3]: PoolMap::get_or_create

mod builder;
mod pool;
mod pool_map;
mod pool_ref;
mod reentry;

pub use builder::*;
// Re-export the dispatcher contract so implementing a custom one needs only this crate.
pub use drop_queue::DeferDrop;
pub use pool::*;
pub use pool_map::*;
pub use pool_ref::*;
