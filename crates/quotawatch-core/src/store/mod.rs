//! Store - Persistence contract for the tracker
//!
//! The tracker writes through [`CycleStore`]; durable backends live in
//! `quotawatch-store`. [`MemoryStore`] keeps everything in process.

mod memory;
mod traits;


pub use memory::MemoryStore;
pub use traits::CycleStore;
