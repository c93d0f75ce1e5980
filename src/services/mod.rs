pub mod browser;
pub mod collector;
pub mod extract;
pub mod listener;
pub mod processor;
pub mod queue;
