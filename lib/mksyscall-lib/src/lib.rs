//! # Mksyscall Shared Library
//!
//! This crate provides utility functions for the `mksyscall` generator that
//! are independent of code generation itself, currently the command-line
//! argument parser.

pub mod args;
