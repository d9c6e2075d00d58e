pub mod groups;
pub mod relations;
