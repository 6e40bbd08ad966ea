pub mod filter;
pub mod note;
pub mod prediction;
pub mod user;
