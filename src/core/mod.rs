pub mod assembler;
pub mod buffer;
pub mod engine;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod model;
pub mod planner;
