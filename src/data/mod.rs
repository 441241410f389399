pub mod cache;
pub mod loader;

pub use cache::{DataCache, RawTables, Snapshot};
pub use loader::{load_table, InputFormat};
