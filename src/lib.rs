pub mod error;
pub mod entropy;

pub mod keccak;
pub mod shake;
pub mod nist_drbg;

pub mod ntru_params;
pub mod ntru_poly;
pub mod ntru_codec;
pub mod ntru_encrypt;
pub mod scheme;

pub mod config;
pub mod harness;
pub mod cli;
