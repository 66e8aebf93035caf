pub mod codec;
pub mod config;
pub mod domain;
pub mod errors;
pub mod float_serde;
pub mod objective;
pub mod population;
