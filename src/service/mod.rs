pub mod accounting;
pub mod attendance;
pub mod profile;
pub mod project;
