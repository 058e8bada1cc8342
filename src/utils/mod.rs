mod atomic_file;
pub mod logging;

pub use atomic_file::atomic_write_json;
