pub mod response;
pub mod status;

pub use response::{ApiResponse, ErrorEnvelope, ErrorMessage, error_response};
pub use status::reason_phrase;
