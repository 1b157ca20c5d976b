#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod aggregate;
pub mod config;
pub mod input;
pub mod knowledge;
pub mod pipeline;
pub mod record;
pub mod status;
pub mod types;

#[path = "../classify/lib.rs"]
pub mod classify;
