//! HTTP boundary helpers: problem details, the unified error type, caller
//! identity and request ids.

pub mod error;
pub mod identity;
pub mod problem;
pub mod request_id;
pub mod response;

pub use error::{ApiError, ApiResult};
pub use identity::{token_auth, Identity, ObjectConstraint, TokenRegistry};
pub use problem::{Problem, ProblemResponse, ValidationError};
