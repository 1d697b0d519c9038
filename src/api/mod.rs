pub mod middleware;
pub mod page;
pub mod routes;
pub mod upload;

// Re-export public types and functions
pub use middleware::log_request_errors;
pub use routes::{index, logs, start_stream, status, stop_stream};
pub use upload::{sanitize_upload_name, upload_file, upload_page};
