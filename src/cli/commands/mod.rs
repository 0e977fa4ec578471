pub mod policy;
pub mod token;
