//! Cross-thread primitives shared by the acquisition, timecode and
//! network threads.

pub mod cancel;
pub mod slot;
pub mod worker;

pub use cancel::CancelToken;
pub use slot::LatestCell;
pub use worker::{spawn_worker, Worker};
