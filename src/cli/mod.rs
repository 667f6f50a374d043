//! Command-line interface

pub mod commands;

pub use commands::{cmd_build, cmd_decode, cmd_keygen, cmd_sign, BuildOptions, CliResult};
