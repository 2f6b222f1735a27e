//! # Shim Generation
//!
//! This module implements the generation operation: scan a set of input
//! files for prototype lines, lower every descriptor under the selected
//! target profile, and write one assembled output unit.
//!
//! Generation is a single-shot, deterministic transformation. Any parse or
//! capacity error aborts the whole run without writing output; generated
//! code is produced completely or not at all.

use crate::abi;
use crate::emit;
use crate::profile;
use crate::proto;

/// Enumeration of all errors that can abort a generation run.
#[derive(Debug)]
pub enum Error {
    /// No prototype lines were found in the input set.
    NoPrototypes,
    /// Reading the input file at the specified path failed.
    File(std::ffi::OsString, std::io::Error),
    /// A prototype line failed to parse.
    Proto(proto::Error),
    /// Lowering a descriptor exceeded a capacity limit.
    Abi(abi::Error),
    /// Writing the output destination failed.
    Output(std::io::Error),
}

/// ## Generation Operation
///
/// This carries the full configuration of one generation run. All values
/// are borrowed from the caller; the operation holds no state of its own.
pub struct Generate<'ctx> {
    /// Target profile the shims are lowered for.
    pub profile: profile::Profile,
    /// Build-tag string propagated into the generated header.
    pub tags: Option<&'ctx str>,
    /// Module the generated unit lives in.
    pub module: &'ctx str,
    /// Output destination, or the standard output stream if unset.
    pub output: Option<&'ctx std::path::Path>,
    /// Input files scanned for prototype lines.
    pub inputs: &'ctx [std::ffi::OsString],
}

impl<'ctx> Generate<'ctx> {
    // Reassemble the canonical invocation for the generated header. It is
    // derived from the effective configuration rather than the raw process
    // arguments, so equivalent invocations produce identical output.
    fn invocation(&self) -> String {
        let mut v = String::from("mksyscall");

        match self.profile.width {
            profile::Width::W64 => {},
            profile::Width::W32Big => v.push_str(" --b32"),
            profile::Width::W32Little => v.push_str(" --l32"),
        }
        match self.profile.family {
            profile::OsFamily::Generic => {},
            profile::OsFamily::Plan9 => v.push_str(" --plan9"),
            profile::OsFamily::OpenBsd => v.push_str(" --openbsd"),
            profile::OsFamily::NetBsd => v.push_str(" --netbsd"),
            profile::OsFamily::Dragonfly => v.push_str(" --dragonfly"),
        }
        if self.profile.arm {
            v.push_str(" --arm");
        }
        if let Some(tags) = self.tags {
            v.push_str(" --tags ");
            v.push_str(tags);
        }
        if self.module != "unix" {
            v.push_str(" --module ");
            v.push_str(self.module);
        }
        if let Some(output) = self.output {
            v.push_str(" --output ");
            v.push_str(&output.to_string_lossy());
        }
        for input in self.inputs.iter() {
            v.push(' ');
            v.push_str(&input.to_string_lossy());
        }

        v
    }

    /// Render the output unit from the given source texts, in order. On
    /// success, yield the assembled unit and any soft warnings raised
    /// during lowering.
    pub fn render(&self, sources: &[&str]) -> Result<(String, Vec<String>), Error> {
        let mut functions = Vec::new();
        let mut warnings = Vec::new();

        for source in sources.iter() {
            for line in source.lines() {
                let f = match proto::Proto::parse(line) {
                    Ok(Some(v)) => v,
                    Ok(None) => continue,
                    Err(e) => return Err(Error::Proto(e)),
                };
                let plan = abi::lower(&f, &self.profile)
                    .map_err(|e| Error::Abi(e))?;

                warnings.extend(plan.warnings.iter().cloned());
                functions.push(emit::render_fn(&f, &plan, self.module));
            }
        }

        if functions.is_empty() {
            return Err(Error::NoPrototypes);
        }

        let unit = emit::unit(
            &self.invocation(),
            self.tags,
            self.module,
            &functions,
        );

        Ok((unit, warnings))
    }

    /// Run the generation operation: scan all input files, render the
    /// output unit, report soft warnings on the error stream, and write
    /// the unit to the configured destination.
    pub fn run(&self) -> Result<(), Error> {
        // Read the inputs one at a time; each file is closed before the
        // next is opened.
        let mut contents = Vec::new();
        for path in self.inputs.iter() {
            let v = std::fs::read_to_string(path)
                .map_err(|e| Error::File(path.clone(), e))?;
            contents.push(v);
        }

        let sources: Vec<&str> = contents.iter().map(|v| v.as_str()).collect();
        let (unit, warnings) = self.render(&sources)?;

        for warning in warnings.iter() {
            eprintln!("Warning: {}", warning);
        }

        match self.output {
            Some(path) => {
                std::fs::write(path, unit.as_bytes())
                    .map_err(|e| Error::Output(e))
            },
            None => {
                use std::io::Write;
                std::io::stdout()
                    .lock()
                    .write_all(unit.as_bytes())
                    .map_err(|e| Error::Output(e))
            },
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        match self {
            Self::NoPrototypes => fmt.write_str("No prototype lines found in the input files"),
            Self::File(path, e) => fmt.write_fmt(core::format_args!("Cannot read input file {}: {}", path.to_string_lossy(), e)),
            Self::Proto(e) => fmt.write_fmt(core::format_args!("Cannot parse prototype: {}", e)),
            Self::Abi(e) => fmt.write_fmt(core::format_args!("Cannot marshal arguments: {}", e)),
            Self::Output(e) => fmt.write_fmt(core::format_args!("Cannot write output: {}", e)),
        }
    }
}
