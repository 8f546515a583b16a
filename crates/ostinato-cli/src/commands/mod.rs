pub mod build;
pub mod config;
pub mod import;
pub mod ingest;
pub mod inspect;
pub mod scan;
pub mod search;
pub mod status;

pub use build::run_build;
pub use import::run_import;
pub use ingest::run_ingest;
pub use inspect::run_inspect;
pub use scan::run_scan;
pub use search::{run_search, SearchArgs};
pub use status::show_status;
