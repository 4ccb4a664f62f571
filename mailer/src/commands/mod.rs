pub mod send;
pub mod smtp;
pub mod validate;
