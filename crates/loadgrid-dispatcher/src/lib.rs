//! loadgrid-dispatcher — routes tasks to hosts.
//!
//! ```text
//! Dispatcher
//!   ├── Placement (fixed at construction)
//!   │     ├── RoundRobin(RoundRobinBalancer)  lock-free cursor
//!   │     ├── ShortestQueue                  min queue_size()
//!   │     ├── SizeInterval                   SHORT/MEDIUM/LONG → host 0/1/2
//!   │     └── LeastWorkLeft                  min work_left()
//!   └── hosts: Vec<Arc<Host>> (immutable)
//! ```

pub mod dispatcher;
pub mod error;
pub mod load_balancer;
pub mod placement;

pub use dispatcher::Dispatcher;
pub use error::{DispatchError, DispatchResult};
pub use load_balancer::RoundRobinBalancer;
pub use placement::Placement;
