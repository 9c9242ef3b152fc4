pub mod arrange;
pub mod backup_exchange;
pub mod core;
pub mod groups;
pub mod schemes;
pub mod seating;
pub mod students;
