pub mod executions;
pub mod projects;
pub mod schedules;
pub mod settings;
pub mod stream;
