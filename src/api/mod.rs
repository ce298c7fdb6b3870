pub mod attendance;
pub mod changes;
pub mod duty;
pub mod leave_request;
pub mod swap;
