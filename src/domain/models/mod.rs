mod classification;
mod pipeline;
mod session;
mod snapshot;
mod transport;

pub use classification::*;
pub use pipeline::*;
pub use session::*;
pub use snapshot::*;
pub use transport::*;
