// src/lib.rs
pub mod io {
    pub mod tokenizer;
    pub mod particle_log;
    pub mod bond_log;
    pub mod validate;
    pub mod sidecar;
    pub mod preprocessed;
    pub mod writer;
}

pub mod pipeline {
    pub mod config;
    pub mod preprocess;
    pub mod cluster;
    pub mod summary;
}

pub mod error;

pub use error::{Error, Result};
