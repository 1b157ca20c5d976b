#![deny(dead_code)]
#![deny(unused_imports)]

pub mod features;
pub mod model;
pub mod risk;
