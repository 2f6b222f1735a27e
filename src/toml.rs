//! # TOML Profile Files
//!
//! This is the Rust representation of the TOML-encoded profile files
//! accepted by the generator via `--config`. A profile file provides the
//! same target selection as the command-line flags; explicit flags take
//! precedence over file-provided values.

use serde;

/// ## Parser Error
///
/// The error-enum reported by the profile-file parser for a single parse
/// operation.
#[derive(Debug)]
pub enum Error {
    /// Reading from the file system failed with the given I/O error.
    File(std::io::Error),
    /// Invalid TOML syntax (syntactical error).
    Toml(String, Option<core::ops::Range<usize>>),
    /// Invalid TOML content (structural error).
    Data(String, Option<core::ops::Range<usize>>),
    /// Unsupported format version number.
    Version(u32),
}

impl Error {
    fn from_toml_syntax(e: &::toml::de::Error) -> Self {
        Self::Toml(e.message().to_string(), e.span())
    }

    fn from_toml_data(e: &::toml::de::Error) -> Self {
        Self::Data(e.message().to_string(), e.span())
    }
}

/// ## Raw Target Table
///
/// Sub-type of `Raw` representing the `target` table. This carries the
/// target selection in keyword form; keywords are verified when the profile
/// is assembled, not here.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RawTarget {
    /// Width keyword: `64`, `b32`, or `l32`.
    pub width: Option<String>,
    /// OS-family keyword: `generic`, `plan9`, `openbsd`, `netbsd`, or
    /// `dragonfly`.
    pub os_family: Option<String>,
    /// Whether the target uses the ARM even-register-pair alignment for
    /// 64-bit arguments.
    pub arm: Option<bool>,

    /// Build-tag string propagated verbatim into the generated header.
    pub tags: Option<String>,
    /// Name of the module the generated file will live in.
    pub module: Option<String>,
}

/// ## Raw Content
///
/// This type contains the raw content as parsed by `toml` and converted
/// into Rust types via `serde`.
///
/// Note that content of the type is not verified other than for syntactic
/// correctness required by the given types. Semantic correctness needs to
/// be verified by the caller.
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Raw {
    /// Version of the format. Only version `1` is currently supported.
    pub version: u32,

    /// Target table carrying the profile selection.
    pub target: Option<RawTarget>,
}

impl Raw {
    // Parse a profile file from an in-memory TOML representation.
    fn parse_toml(table: ::toml::Table) -> Result<Self, Error> {
        // Parse TOML data into structured types via serde.
        let raw = <Self as serde::Deserialize>::deserialize(table)
            .map_err(|v| Error::from_toml_data(&v))?;

        // We only support version '1'. Any other version number is
        // explicitly defined to be incompatible, so fail parsing.
        //
        // Note that we do support unknown-fields. Hence, it is valid to add
        // more fields to version '1' without breaking backwards
        // compatibility. However, they will be silently ignored by older
        // implementations.
        match raw.version {
            1 => Ok(raw),
            _ => Err(Error::Version(raw.version)),
        }
    }

    // Parse a profile file from an in-memory string.
    pub(crate) fn parse_str(content: &str) -> Result<Self, Error> {
        content.parse::<::toml::Table>()
            .map_err(|v| Error::from_toml_syntax(&v))
            .and_then(|v| Self::parse_toml(v))
    }

    /// ## Parse from file-system
    ///
    /// Open the specified file and parse it. The content is verified and
    /// invalid formats are refused. The file is completely parsed into
    /// memory and then closed again before the function returns.
    pub fn parse_path(path: &dyn AsRef<std::path::Path>) -> Result<Self, Error> {
        std::fs::read_to_string(path)
            .map_err(|v| Error::File(v))
            .and_then(|v| Self::parse_str(&v))
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        match self {
            Self::File(e) => fmt.write_fmt(core::format_args!("Cannot read profile file: {}", e)),
            Self::Toml(msg, _) => fmt.write_fmt(core::format_args!("Invalid TOML syntax in profile file: {}", msg)),
            Self::Data(msg, _) => fmt.write_fmt(core::format_args!("Invalid profile-file content: {}", msg)),
            Self::Version(v) => fmt.write_fmt(core::format_args!("Unsupported profile-file version: {}", v)),
        }
    }
}
