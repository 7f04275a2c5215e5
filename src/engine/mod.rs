pub mod approval;
pub mod attendance;
pub mod leave;
