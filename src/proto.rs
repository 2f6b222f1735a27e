//! # Prototype Parsing
//!
//! This module parses one annotated prototype line into a structured
//! function descriptor. A prototype line reads like a function declaration
//! with a `//sys` (or `//sys-nonblocking`) prefix:
//!
//! ```text
//! //sys	open(path string, mode int, perm int) (fd int, err error) = SYS_OPEN
//! ```
//!
//! Every parameter and return value must carry both a name and a type. If a
//! return value is of the error type, it must be named `err`. The trailing
//! `= CALL_ID` is optional; when absent, the call identifier is derived
//! from the function name.

/// Error definitions for all possible failures of the prototype parser.
/// Each variant carries the offending input for diagnostics. Any of these
/// aborts the whole generation run; generated code is produced completely
/// or not at all.
#[derive(Debug)]
pub enum Error {
    /// A list element does not split into exactly a name and a type.
    Parameter(String),
    /// The function name or a bracketed list cannot be extracted.
    Signature(String),
    /// A return value of the error type is not named `err`.
    ErrorName(String),
    /// More than one return value of the error type.
    ErrorCount(String),
    /// More than three return values.
    ReturnCount(String),
    /// Unconsumed text follows the prototype.
    Trailing(String),
}

/// A single named and typed parameter or return value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

/// A parsed function descriptor. Descriptors are immutable once
/// constructed; derived properties are computed on demand.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Proto {
    /// Name of the shim function.
    pub name: String,
    /// Input parameters in declaration order.
    pub params: Vec<Param>,
    /// Return values in declaration order, at most three, at most one of
    /// the error type.
    pub rets: Vec<Param>,
    /// Identifier of the kernel entry point.
    pub call_id: String,
    /// Whether the call may suspend the caller. Nonblocking descriptors
    /// use the cheaper raw dispatch primitives; the generator trusts this
    /// assertion, it cannot verify it.
    pub blocking: bool,
}

impl Param {
    /// Whether this value is the distinguished error type.
    pub fn is_error(&self) -> bool {
        self.ty == "error"
    }

    /// Whether this value is a sequence-of-T.
    pub fn is_slice(&self) -> bool {
        self.ty.starts_with("[]")
    }

    /// Whether this value is a pointer-to-T.
    pub fn is_pointer(&self) -> bool {
        self.ty.starts_with('*')
    }

    /// Whether this value is a 64-bit integer, subject to half-splitting
    /// on 32-bit targets.
    pub fn is_wide(&self) -> bool {
        self.ty == "int64" || self.ty == "uint64"
    }

    // Whether marshaling this parameter introduces a temp binding.
    fn needs_temp(&self) -> bool {
        self.ty == "string" || self.ty == "bool" || self.is_slice()
    }
}

impl Proto {
    /// Parse one line of input. Lines that do not carry a recognized
    /// prototype prefix yield `None` and are to be ignored by the caller;
    /// lines that do carry one must parse completely or fail.
    pub fn parse(line: &str) -> Result<Option<Self>, Error> {
        let line = trim(line);

        // Recognize the prefix. The nonblocking form must be tested first
        // since it shares the standard form as a prefix. The prefix must
        // be followed by a space or tab, otherwise the line is unrelated.
        let (rest, blocking) = if let Some(v) = line.strip_prefix("//sys-nonblocking") {
            (v, false)
        } else if let Some(v) = line.strip_prefix("//sys") {
            (v, true)
        } else {
            return Ok(None);
        };
        let rest = match rest.strip_prefix([' ', '\t']) {
            Some(v) => v,
            None => return Ok(None),
        };

        // Strip an optional trailing `= CALL_ID` override. Only a valid
        // identifier is stripped; anything else stays on the line and is
        // diagnosed by the signature extraction below.
        let (rest, call_id) = match rest.rsplit_once('=') {
            Some((head, tail)) if is_ident(trim(tail)) => {
                (trim(head), Some(trim(tail).to_string()))
            },
            _ => (rest, None),
        };

        // Extract the function name and the parameter list.
        let (prefix, body, rest) = section(rest)
            .ok_or_else(|| Error::Signature(line.into()))?;
        let name = trim(prefix);
        if name.is_empty() {
            return Err(Error::Signature(line.into()));
        }
        let params = list(body)?;

        // Extract the optional return list. Nothing may follow it; a
        // half-understood prototype must not produce code.
        let (rest, rets) = if trim(rest).starts_with('(') {
            let (_, body, tail) = section(rest)
                .ok_or_else(|| Error::Signature(line.into()))?;
            (tail, list(body)?)
        } else {
            (rest, Vec::new())
        };
        if !trim(rest).is_empty() {
            return Err(Error::Trailing(trim(rest).into()));
        }

        if rets.len() > 3 {
            return Err(Error::ReturnCount(line.into()));
        }
        let mut errors = 0;
        for r in rets.iter() {
            if r.is_error() {
                if r.name != "err" {
                    return Err(Error::ErrorName(format!("{} {}", r.name, r.ty)));
                }
                errors += 1;
            }
        }
        if errors > 1 {
            return Err(Error::ErrorCount(line.into()));
        }

        let name = name.to_string();
        let call_id = call_id.unwrap_or_else(|| derive_call_id(&name));

        Ok(Some(Self {
            name: name,
            params: params,
            rets: rets,
            call_id: call_id,
            blocking: blocking,
        }))
    }

    /// The return value carrying the error, if any.
    pub fn error_ret(&self) -> Option<&Param> {
        self.rets.iter().find(|v| v.is_error())
    }

    /// Whether some return value carries the error.
    pub fn has_error_ret(&self) -> bool {
        self.error_ret().is_some()
    }

    /// The name bound to the error return, if any.
    pub fn error_name(&self) -> Option<&str> {
        self.error_ret().map(|v| v.name.as_str())
    }

    /// The temp binding name for the parameter at the given index, or
    /// `None` if marshaling it needs no temp. The slot index is derived
    /// from the position in the declaration list, so temp names are stable
    /// and unique regardless of evaluation order.
    pub fn temp_name(&self, index: usize) -> Option<String> {
        if !self.params.get(index)?.needs_temp() {
            return None;
        }
        let slot = self.params[..index]
            .iter()
            .filter(|v| v.needs_temp())
            .count();
        Some(format!("_p{}", slot))
    }
}

// Trim the spaces and tabs the prototype grammar allows around tokens.
fn trim(v: &str) -> &str {
    v.trim_matches([' ', '\t'])
}

// Whether the value is a plain identifier, as required for call-id
// overrides.
fn is_ident(v: &str) -> bool {
    !v.is_empty() && v.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// Extract the first balanced parenthesized section of `s`, yielding the
// text before the opening bracket, the bracketed body, and the remaining
// suffix. Yields `None` on missing or unmatched brackets.
fn section(s: &str) -> Option<(&str, &str, &str)> {
    let open = s.find('(')?;
    let (prefix, rem) = s.split_at(open);

    let mut depth = 0usize;
    for (i, c) in rem.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((prefix, &rem[1..i], &rem[i + 1..]));
                }
            },
            _ => {},
        }
    }

    None
}

// Parse a comma-separated list of `name type` elements.
fn list(body: &str) -> Result<Vec<Param>, Error> {
    let body = trim(body);
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let mut acc = Vec::new();
    for element in body.split(',') {
        let element = trim(element);
        let mut tokens = element.split([' ', '\t']).filter(|v| !v.is_empty());
        match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(name), Some(ty), None) => acc.push(Param {
                name: name.into(),
                ty: ty.into(),
            }),
            _ => return Err(Error::Parameter(element.into())),
        }
    }

    Ok(acc)
}

/// Derive the call identifier from a function name: `SYS_` followed by the
/// name in upper-snake-case, splitting on every lowercase-to-uppercase
/// boundary.
pub fn derive_call_id(name: &str) -> String {
    let mut v = String::with_capacity(4 + name.len() * 2);
    v.push_str("SYS_");

    let mut prev_lower = false;
    for c in name.chars() {
        if prev_lower && c.is_ascii_uppercase() {
            v.push('_');
        }
        prev_lower = c.is_ascii_lowercase();
        v.push(c.to_ascii_uppercase());
    }

    v
}

/// Map a prototype-dialect type to the Rust surface type of the emitted
/// shim. Unknown names pass through verbatim and are expected to be
/// visible at the emission site.
pub fn rust_type(ty: &str) -> String {
    if let Some(elem) = ty.strip_prefix("[]") {
        return format!("&[{}]", rust_type(elem));
    }
    if let Some(referee) = ty.strip_prefix('*') {
        return format!("*mut {}", rust_type(referee));
    }

    match ty {
        "int" => "isize",
        "uint" => "usize",
        "uintptr" => "usize",
        "int8" => "i8",
        "int16" => "i16",
        "int32" => "i32",
        "int64" => "i64",
        "uint8" => "u8",
        "uint16" => "u16",
        "uint32" => "u32",
        "uint64" => "u64",
        "byte" => "u8",
        "bool" => "bool",
        "string" => "&str",
        v => v,
    }.into()
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        match self {
            Self::Parameter(v) => fmt.write_fmt(core::format_args!("Cannot extract a name and a type from \"{}\"", v)),
            Self::Signature(v) => fmt.write_fmt(core::format_args!("Cannot extract function name and parameters from \"{}\"", v)),
            Self::ErrorName(v) => fmt.write_fmt(core::format_args!("A return value of the error type must be named `err`: \"{}\"", v)),
            Self::ErrorCount(v) => fmt.write_fmt(core::format_args!("At most one return value may be of the error type: \"{}\"", v)),
            Self::ReturnCount(v) => fmt.write_fmt(core::format_args!("Too many return values in \"{}\"", v)),
            Self::Trailing(v) => fmt.write_fmt(core::format_args!("Unexpected text after the prototype: \"{}\"", v)),
        }
    }
}
