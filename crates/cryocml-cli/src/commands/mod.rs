pub mod find;
pub mod project;
