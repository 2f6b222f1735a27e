//! # Executable Entry Points
//!
//! This module exposes the entry-point of the `mksyscall` command-line
//! tool. It implements the command-line interface of the generator and
//! merely wires the library APIs together; none of the generation logic
//! lives here.

use crate::op;
use crate::profile;
use crate::toml;
use mksyscall_lib::args;

/// Application entry-point of mksyscall.
///
/// This is the entry-point to the shim generator. It parses the process
/// arguments, assembles the target profile, and runs the generation
/// operation. Usage errors exit with status 2, operation errors with
/// status 1.
pub fn mksyscall() -> std::process::ExitCode {
    struct Cli {
    }

    impl Cli {
        fn new() -> Self {
            Self {
            }
        }

        // Parse the profile file specified via `--config`, if any.
        fn raw_target(
            &self,
            v_config: &Option<std::ffi::OsString>,
        ) -> Result<Option<toml::RawTarget>, u8> {
            let path = match v_config {
                None => return Ok(None),
                Some(v) => v,
            };

            match toml::Raw::parse_path(path) {
                Ok(v) => Ok(v.target),
                Err(e) => {
                    eprintln!("Cannot parse profile file: {}", e);
                    Err(1)
                },
            }
        }

        fn run(&self) -> Result<(), u8> {
            use args::{Flag, Value};

            let arguments = std::env::args_os().skip(1).collect::<Vec<std::ffi::OsString>>();

            let v_help = args::Help::new();

            let v_b32: core::cell::RefCell<bool> = Default::default();
            let v_l32: core::cell::RefCell<bool> = Default::default();
            let v_plan9: core::cell::RefCell<bool> = Default::default();
            let v_openbsd: core::cell::RefCell<bool> = Default::default();
            let v_netbsd: core::cell::RefCell<bool> = Default::default();
            let v_dragonfly: core::cell::RefCell<bool> = Default::default();
            let v_arm: core::cell::RefCell<bool> = Default::default();
            let v_tags: core::cell::RefCell<Option<String>> = Default::default();
            let v_module: core::cell::RefCell<Option<String>> = Default::default();
            let v_output: core::cell::RefCell<Option<std::ffi::OsString>> = Default::default();
            let v_config: core::cell::RefCell<Option<std::ffi::OsString>> = Default::default();
            let v_inputs: core::cell::RefCell<Vec<std::ffi::OsString>> = Default::default();

            let flags = args::FlagList::with([
                Flag::with_name("help", Value::Set(&v_help), Some("Show usage information")),

                Flag::with_name("b32", Value::Set(&v_b32), Some("Generate for a 32-bit big-endian target")),
                Flag::with_name("l32", Value::Set(&v_l32), Some("Generate for a 32-bit little-endian target")),
                Flag::with_name("plan9", Value::Set(&v_plan9), Some("Generate for the Plan9 OS family")),
                Flag::with_name("openbsd", Value::Set(&v_openbsd), Some("Generate for the OpenBSD OS family")),
                Flag::with_name("netbsd", Value::Set(&v_netbsd), Some("Generate for the NetBSD OS family")),
                Flag::with_name("dragonfly", Value::Set(&v_dragonfly), Some("Generate for the DragonFly OS family")),
                Flag::with_name("arm", Value::Set(&v_arm), Some("Align 64-bit arguments on even register pairs")),

                Flag::with_name("tags", Value::Parse(&v_tags), Some("Build-tag string for the generated file")),
                Flag::with_name("module", Value::Parse(&v_module), Some("Module the generated file lives in")),
                Flag::with_name("output", Value::Parse(&v_output), Some("Path of the output file (default: standard output)")),
                Flag::with_name("config", Value::Parse(&v_config), Some("Path to a TOML target-profile file")),
            ]);

            let cmd = args::Command::with_name(
                "mksyscall",
                &flags,
                Some(&v_inputs),
                Some("Generate system-call shims from annotated prototypes"),
            );

            let r = args::Parser::new().parse_osstr(&arguments, &cmd);

            // Handle all errors of the command-line parser. Note that we
            // get a batch of errors, which we all propagate to the user.
            if let Err(errors) = r {
                eprintln!("Cannot parse command-line arguments:");
                for e in errors.iter() {
                    eprintln!("- {}", e);
                }
                return Err(2);
            }

            // If `--help` was requested, show usage information on
            // `stdout` and exit with success.
            let mut help = String::new();
            if v_help
                .help(&cmd, &mut help)
                .expect("In-memory formatting must succeed")
            {
                print!("{}", help);
                return Ok(());
            }

            let raw = self.raw_target(&*v_config.borrow())?;

            let families = [
                (*v_plan9.borrow(), profile::OsFamily::Plan9),
                (*v_openbsd.borrow(), profile::OsFamily::OpenBsd),
                (*v_netbsd.borrow(), profile::OsFamily::NetBsd),
                (*v_dragonfly.borrow(), profile::OsFamily::Dragonfly),
            ];
            let target = match profile::Profile::assemble(
                *v_b32.borrow(),
                *v_l32.borrow(),
                &families,
                *v_arm.borrow(),
                raw.as_ref(),
            ) {
                Ok(v) => v,
                Err(e) => {
                    eprintln!("Cannot assemble target profile: {}", e);
                    return Err(2);
                },
            };

            // Explicit flags take precedence over file-provided values.
            let tags = v_tags.borrow().clone()
                .or_else(|| raw.as_ref().and_then(|v| v.tags.clone()));
            let module = v_module.borrow().clone()
                .or_else(|| raw.as_ref().and_then(|v| v.module.clone()))
                .unwrap_or_else(|| "unix".to_string());

            let inputs = v_inputs.borrow();
            if inputs.is_empty() {
                eprintln!("No input files specified");
                return Err(2);
            }

            let output = v_output.borrow().clone();
            let generate = op::Generate {
                profile: target,
                tags: tags.as_deref(),
                module: &module,
                output: output.as_deref().map(std::path::Path::new),
                inputs: &inputs,
            };

            match generate.run() {
                Ok(()) => Ok(()),
                Err(e @ op::Error::NoPrototypes) => {
                    eprintln!("Cannot generate shims: {}", e);
                    Err(2)
                },
                Err(e) => {
                    eprintln!("Cannot generate shims: {}", e);
                    Err(1)
                },
            }
        }
    }

    match Cli::new().run() {
        Ok(()) => 0.into(),
        Err(v) => v.into(),
    }
}
