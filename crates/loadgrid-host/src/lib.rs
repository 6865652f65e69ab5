//! loadgrid-host — a simulated worker node.
//!
//! A `Host` owns one priority queue and one in-flight slot and runs its own
//! scheduling loop:
//!
//! ```text
//! Host
//!   ├── Mutex<HostState>
//!   │     ├── queue    (sorted: priority desc, arrival asc)
//!   │     ├── current  (at most one task, charged wall-clock time)
//!   │     └── finished (completion log)
//!   ├── Notify         (wake-on-submit)
//!   └── run-loop task  (sort → preempt → retire/promote → advance)
//! ```

pub mod host;
pub mod state;

pub use host::{Host, HostConfig, HostSnapshot};
pub use state::{HostState, Preemption, TickReport};
