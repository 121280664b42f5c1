pub mod addon;
pub mod manifest;
pub mod model;
pub mod naming;
pub mod repository;
pub mod schedule;
pub mod stack;
pub mod template;
pub mod validate;
