pub mod sql;
pub mod text;
