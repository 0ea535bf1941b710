//! Infrastructure error handling.

mod conversions;

pub use conversions::{error_for_status, InfraError};
pub(crate) use conversions::{is_unique_violation, map_join_error, map_sql_error};
