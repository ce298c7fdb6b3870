pub mod attendance;
pub mod duty;
pub mod duty_swap;
pub mod leave_request;
pub mod location_zone;
pub mod role;
pub mod user;
