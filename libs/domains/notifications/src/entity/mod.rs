//! Sea-ORM entities for the tables the pipeline reads and writes.

pub mod departments;
pub mod employees;
pub mod handovers;
pub mod notifications;
pub mod task_nodes;
pub mod tasks;
