pub mod handlers;
pub mod logging;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    execute_run, list_records, load_config, open_store, render_records, write_starter_config,
};
pub use logging::init_logging;
