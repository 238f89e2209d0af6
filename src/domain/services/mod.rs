mod classifier;
mod lifecycle;
mod poller;
mod step_progress;
mod ticker;

pub use classifier::*;
pub use lifecycle::*;
pub use poller::*;
pub use step_progress::*;
pub use ticker::*;
