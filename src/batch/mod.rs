//! Batch execution: the list of items to publish, and the queue that runs
//! their definitions against the host one at a time.

pub mod item;
pub mod prepare;
pub mod progress;
pub mod queue;
pub mod summary;
pub mod worker;
