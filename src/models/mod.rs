pub mod job;
pub mod post;
pub mod submission;
