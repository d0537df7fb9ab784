pub mod configs;
pub mod study;
