// Adapters: concrete storage and publishing backends behind the domain ports.

pub mod storage;

pub use storage::{AtomicDirectoryPublisher, LocalStorage};
