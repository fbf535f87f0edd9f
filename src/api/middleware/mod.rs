pub mod jwt_extractor;
pub mod rbac;
pub mod request_timeout;
pub mod trace_id;

pub use jwt_extractor::{jwt_extractor_middleware, JwtAuthContext};
pub use rbac::{require_admin, require_admin_middleware};
pub use request_timeout::request_timeout_middleware;
pub use trace_id::{current_trace_id, trace_id_middleware};
