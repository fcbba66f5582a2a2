pub mod directory;
pub mod dispatch;
pub mod scheduler;
pub mod template;
pub mod worker;
