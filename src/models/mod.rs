pub mod history;
pub mod identity;
pub mod job;
pub mod recipient;
pub mod template;
