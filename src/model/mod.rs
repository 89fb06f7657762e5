pub mod attendance;
pub mod project;
pub mod role;
pub mod timestamp;
pub mod user;
