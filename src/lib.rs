#![forbid(unsafe_code)]
pub mod compile;
pub mod schemas;
pub mod source;
