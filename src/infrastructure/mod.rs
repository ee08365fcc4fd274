pub mod in_memory;
pub mod log_publisher;
pub mod outbox_file;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
