//! # Target Profiles
//!
//! A target profile describes the machine and operating-system family a
//! generation run produces shims for. It is an immutable value threaded
//! explicitly through the marshaling engine and the emitter; nothing in the
//! generator reads ambient process state.

use crate::toml;

/// Enumeration of all errors that can occur when assembling a profile from
/// source material.
#[derive(Debug)]
pub enum Error {
    /// The width selectors are mutually exclusive.
    WidthExclusive,
    /// The OS-family selectors are mutually exclusive.
    FamilyExclusive,
    /// Unknown width keyword in a profile file.
    WidthUnknown(String),
    /// Unknown OS-family keyword in a profile file.
    FamilyUnknown(String),
}

/// Word width and byte order of the target machine. The 64-bit case carries
/// no byte order since no 64-bit argument is ever split on it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Width {
    W64,
    W32Big,
    W32Little,
}

/// Byte order of a 32-bit target, deciding which half of a split 64-bit
/// value occupies the first argument slot.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Endianness {
    Big,
    Little,
}

/// Operating-system family of the target. The family selects the
/// failure-return convention and a small set of argument-marshaling quirks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OsFamily {
    Generic,
    Plan9,
    OpenBsd,
    NetBsd,
    Dragonfly,
}

/// A complete target profile. Constructed once per generation run, then
/// borrowed by the engine and emitter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Profile {
    pub width: Width,
    pub family: OsFamily,
    pub arm: bool,
}

impl Width {
    /// Yield the byte order of the target, or `None` on 64-bit targets
    /// where 64-bit values are never split.
    pub fn endianness(self) -> Option<Endianness> {
        match self {
            Self::W64 => None,
            Self::W32Big => Some(Endianness::Big),
            Self::W32Little => Some(Endianness::Little),
        }
    }
}

impl OsFamily {
    /// Whether a split 64-bit argument is preceded by a zero-filler slot on
    /// this family. The filler mirrors the register padding these kernels
    /// expect before a 64-bit pair.
    pub fn splits_with_filler(self) -> bool {
        matches!(self, Self::OpenBsd | Self::NetBsd)
    }

    /// Whether the named kernel entry point reserves the 64-bit padding
    /// slot in its own signature, in which case the generator must not add
    /// the filler. This is a closed per-family quirk table, not a general
    /// rule; the only known entries are the dragonfly `extpread` and
    /// `extpwrite` calls.
    pub fn reserves_pad(self, name: &str) -> bool {
        match self {
            Self::Dragonfly => {
                let lower = name.to_ascii_lowercase();
                lower.starts_with("extpread") || lower.starts_with("extpwrite")
            },
            _ => false,
        }
    }
}

impl Profile {
    /// Assemble a profile from the command-line selectors and an optional
    /// profile file. Explicit selectors take precedence over file-provided
    /// values; the selectors within each group are mutually exclusive.
    pub fn assemble(
        b32: bool,
        l32: bool,
        families: &[(bool, OsFamily)],
        arm: bool,
        raw: Option<&toml::RawTarget>,
    ) -> Result<Self, Error> {
        let width = match (b32, l32) {
            (true, true) => return Err(Error::WidthExclusive),
            (true, false) => Some(Width::W32Big),
            (false, true) => Some(Width::W32Little),
            (false, false) => None,
        };

        let mut family = None;
        for (set, v) in families {
            if *set {
                if family.is_some() {
                    return Err(Error::FamilyExclusive);
                }
                family = Some(*v);
            }
        }

        // Fall back to file-provided values for anything left unset.
        let width = match (width, raw.and_then(|v| v.width.as_deref())) {
            (Some(v), _) => v,
            (None, Some(v)) => Self::width_keyword(v)?,
            (None, None) => Width::W64,
        };
        let family = match (family, raw.and_then(|v| v.os_family.as_deref())) {
            (Some(v), _) => v,
            (None, Some(v)) => Self::family_keyword(v)?,
            (None, None) => OsFamily::Generic,
        };
        let arm = arm || raw.and_then(|v| v.arm).unwrap_or(false);

        Ok(Self {
            width: width,
            family: family,
            arm: arm,
        })
    }

    fn width_keyword(v: &str) -> Result<Width, Error> {
        match v {
            "64" => Ok(Width::W64),
            "b32" => Ok(Width::W32Big),
            "l32" => Ok(Width::W32Little),
            _ => Err(Error::WidthUnknown(v.into())),
        }
    }

    fn family_keyword(v: &str) -> Result<OsFamily, Error> {
        match v {
            "generic" => Ok(OsFamily::Generic),
            "plan9" => Ok(OsFamily::Plan9),
            "openbsd" => Ok(OsFamily::OpenBsd),
            "netbsd" => Ok(OsFamily::NetBsd),
            "dragonfly" => Ok(OsFamily::Dragonfly),
            _ => Err(Error::FamilyUnknown(v.into())),
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        match self {
            Self::WidthExclusive => fmt.write_str("Width selectors are mutually exclusive: --b32, --l32"),
            Self::FamilyExclusive => fmt.write_str("OS-family selectors are mutually exclusive: --plan9, --openbsd, --netbsd, --dragonfly"),
            Self::WidthUnknown(v) => fmt.write_fmt(core::format_args!("Unknown width keyword: {}", v)),
            Self::FamilyUnknown(v) => fmt.write_fmt(core::format_args!("Unknown OS-family keyword: {}", v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_families() -> Vec<(bool, OsFamily)> {
        vec![
            (false, OsFamily::Plan9),
            (false, OsFamily::OpenBsd),
            (false, OsFamily::NetBsd),
            (false, OsFamily::Dragonfly),
        ]
    }

    // Verify the default profile: 64-bit, generic family, no ARM
    // alignment.
    #[test]
    fn assemble_default() {
        let p = Profile::assemble(false, false, &no_families(), false, None).unwrap();

        assert_eq!(p.width, Width::W64);
        assert_eq!(p.family, OsFamily::Generic);
        assert_eq!(p.arm, false);
        assert_eq!(p.width.endianness(), None);
    }

    // Verify that the width selectors reject combined use.
    #[test]
    fn assemble_width_exclusive() {
        assert!(matches!(
            Profile::assemble(true, true, &no_families(), false, None).unwrap_err(),
            Error::WidthExclusive,
        ));
    }

    // Verify that the family selectors reject combined use.
    #[test]
    fn assemble_family_exclusive() {
        let families = vec![
            (true, OsFamily::OpenBsd),
            (true, OsFamily::NetBsd),
        ];

        assert!(matches!(
            Profile::assemble(false, false, &families, false, None).unwrap_err(),
            Error::FamilyExclusive,
        ));
    }

    // Verify that file-provided keywords fill unset selectors, and that
    // explicit selectors override them.
    #[test]
    fn assemble_from_raw() {
        let raw = toml::RawTarget {
            width: Some("b32".into()),
            os_family: Some("netbsd".into()),
            arm: Some(true),
            tags: None,
            module: None,
        };

        let p = Profile::assemble(false, false, &no_families(), false, Some(&raw)).unwrap();
        assert_eq!(p.width, Width::W32Big);
        assert_eq!(p.family, OsFamily::NetBsd);
        assert_eq!(p.arm, true);

        let p = Profile::assemble(false, true, &no_families(), false, Some(&raw)).unwrap();
        assert_eq!(p.width, Width::W32Little);
    }

    // Verify that unknown profile-file keywords are rejected.
    #[test]
    fn assemble_bad_keywords() {
        let raw = toml::RawTarget {
            width: Some("w16".into()),
            os_family: None,
            arm: None,
            tags: None,
            module: None,
        };

        assert!(matches!(
            Profile::assemble(false, false, &no_families(), false, Some(&raw)).unwrap_err(),
            Error::WidthUnknown(_),
        ));
    }

    // Verify the dragonfly quirk table: the filler is suppressed only for
    // the two calls whose kernel signatures reserve the padding, matched
    // case-insensitively by prefix.
    #[test]
    fn quirk_table() {
        assert_eq!(OsFamily::Dragonfly.reserves_pad("extpread"), true);
        assert_eq!(OsFamily::Dragonfly.reserves_pad("ExtpWrite"), true);
        assert_eq!(OsFamily::Dragonfly.reserves_pad("pread"), false);
        assert_eq!(OsFamily::Generic.reserves_pad("extpread"), false);
        assert_eq!(OsFamily::OpenBsd.reserves_pad("extpwrite"), false);
    }

    // Verify the filler rule for the BSD families that expect register
    // padding before a split 64-bit argument.
    #[test]
    fn filler_families() {
        assert_eq!(OsFamily::OpenBsd.splits_with_filler(), true);
        assert_eq!(OsFamily::NetBsd.splits_with_filler(), true);
        assert_eq!(OsFamily::Generic.splits_with_filler(), false);
        assert_eq!(OsFamily::Dragonfly.splits_with_filler(), false);
        assert_eq!(OsFamily::Plan9.splits_with_filler(), false);
    }
}
