//! # Mksyscall
//!
//! This executable is the command-line front-end of the system-call shim
//! generator. It simply calls into `mksyscall::mksyscall()` of the
//! accompanying library.

use mksyscall;

fn main() -> std::process::ExitCode {
    mksyscall::mksyscall()
}
