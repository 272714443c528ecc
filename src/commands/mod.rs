pub mod dump;
pub mod ls;
pub mod summary;
