//! # Mksyscall System-Call Shim Generator
//!
//! This library implements a source-to-source generator that turns
//! declarative function prototypes into platform-specific shim code for
//! invoking operating-system kernel entry points. A prototype is a single
//! annotated line carrying a function name, named and typed input
//! parameters, and named and typed return values.
//!
//! All operations of the command-line tool are also exposed as Rust APIs
//! in this library, so external tools can drive the generator directly.

pub mod abi;
pub mod emit;
pub mod op;
pub mod profile;
pub mod proto;
pub mod toml;

mod exe;

pub use exe::mksyscall;
