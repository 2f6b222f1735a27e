//! # ABI Argument Marshaling
//!
//! This module lowers a parsed function descriptor into a marshaling plan
//! under the rules of a target profile: one or two argument slots per
//! parameter, the dispatch primitive to invoke, the registers each return
//! value reads from, and the failure check of the target OS family.
//!
//! The lowering is deterministic and purely value-based. All names in the
//! plan are unqualified; the emitter applies the module namespace when it
//! renders the plan as source text.

use crate::profile;
use crate::proto;

/// Capacity errors of the lowering. Both abort the whole generation run,
/// since a shim that cannot pass all its arguments or capture all its
/// results must not be produced at all.
#[derive(Debug)]
pub enum Error {
    /// The argument slots exceed the largest dispatch arity.
    TooManyArgs(String),
    /// Not enough result registers remain for a return value.
    Registers(String),
}

/// A temp binding evaluated before the dispatch call. Temps are declared
/// in parameter order; their names come from the descriptor's slot
/// derivation.
#[derive(Debug, Eq, PartialEq)]
pub enum Prep {
    /// Convert a string parameter to a null-terminated byte pointer. If
    /// `fallible` is set, a conversion failure propagates into the error
    /// return; otherwise it is silently discarded.
    Str {
        temp: String,
        param: String,
        fallible: bool,
    },
    /// Bind the address of the first element of a sequence parameter, or
    /// the private zero sentinel if the sequence is empty. The kernel
    /// never sees a null address paired with a nonzero length.
    Slice {
        temp: String,
        param: String,
    },
    /// Convert a boolean parameter to 0 or 1.
    Bool {
        temp: String,
        param: String,
    },
}

/// One post-call result conversion: bind `name` to `expr`, where `expr`
/// reads one or two result registers.
#[derive(Debug, Eq, PartialEq)]
pub struct Conv {
    pub name: String,
    pub expr: String,
}

/// The failure check appended after the result conversions.
#[derive(Debug, Eq, PartialEq)]
pub enum Check {
    /// No error return; no check.
    None,
    /// Nonzero error register carries an errno value.
    Errno,
    /// Plan9 convention: the primary result register equal to -1, as a
    /// 32-bit signed value, marks failure.
    Plan9,
}

/// How the dispatch call's result tuple is captured.
#[derive(Debug, Eq, PartialEq)]
pub enum Capture {
    /// No register is read; the call is a bare statement.
    Bare,
    /// The two-register tuple of the no-error primitive.
    Pair([String; 2]),
    /// The full three-register tuple.
    Triple([String; 3]),
}

/// A complete marshaling plan for one function descriptor.
#[derive(Debug)]
pub struct Plan {
    /// Temp bindings in parameter order.
    pub preps: Vec<Prep>,
    /// Argument-slot expressions, zero-padded to `arity`.
    pub args: Vec<String>,
    /// Dispatch arity: 3, 6, or 9.
    pub arity: usize,
    /// Unqualified name of the dispatch primitive.
    pub dispatch: String,
    /// Capture form of the dispatch result.
    pub capture: Capture,
    /// Result conversions in return-declaration order.
    pub convs: Vec<Conv>,
    /// Failure check of the target OS family.
    pub check: Check,
    /// Non-fatal diagnostics to report alongside the generated code.
    pub warnings: Vec<String>,
}

// Append the slots of one split 64-bit argument, ordered by the byte
// order of the target.
fn push_halves(args: &mut Vec<String>, name: &str, endianness: profile::Endianness) {
    let hi = format!("({} >> 32) as usize", name);
    let lo = format!("{} as usize", name);
    match endianness {
        profile::Endianness::Big => {
            args.push(hi);
            args.push(lo);
        },
        profile::Endianness::Little => {
            args.push(lo);
            args.push(hi);
        },
    }
}

/// Lower one function descriptor into a marshaling plan for the given
/// target profile.
pub fn lower(f: &proto::Proto, p: &profile::Profile) -> Result<Plan, Error> {
    let has_err = f.has_error_ret();
    let mut preps = Vec::new();
    let mut args = Vec::new();
    let mut warnings = Vec::new();

    // Encode every parameter into its argument slots, first matching rule
    // wins: pointer, string, sequence, split 64-bit, scalar.
    for (i, param) in f.params.iter().enumerate() {
        if param.is_pointer() {
            args.push(format!("{} as usize", param.name));
        } else if param.ty == "string" {
            let temp = match f.temp_name(i) {
                Some(v) => v,
                None => continue,
            };
            if !has_err {
                warnings.push(format!(
                    "{}: conversion failure of string parameter `{}` cannot be reported without an error return",
                    f.name,
                    param.name,
                ));
            }
            args.push(format!("{} as usize", temp));
            preps.push(Prep::Str {
                temp: temp,
                param: param.name.clone(),
                fallible: has_err,
            });
        } else if param.is_slice() {
            let temp = match f.temp_name(i) {
                Some(v) => v,
                None => continue,
            };
            args.push(temp.clone());
            args.push(format!("{}.len()", param.name));
            preps.push(Prep::Slice {
                temp: temp,
                param: param.name.clone(),
            });
        } else if param.is_wide() && p.width != profile::Width::W64 {
            let endianness = match p.width.endianness() {
                Some(v) => v,
                None => continue,
            };
            if p.family.splits_with_filler() {
                args.push("0".into());
            } else if p.family == profile::OsFamily::Dragonfly {
                if !p.family.reserves_pad(&f.name) {
                    args.push("0".into());
                }
            } else if p.arm && args.len() % 2 != 0 {
                // 64-bit arguments must start on an even register pair.
                args.push("0".into());
            }
            push_halves(&mut args, &param.name, endianness);
        } else if param.ty == "bool" {
            let temp = match f.temp_name(i) {
                Some(v) => v,
                None => continue,
            };
            args.push(temp.clone());
            preps.push(Prep::Bool {
                temp: temp,
                param: param.name.clone(),
            });
        } else {
            args.push(format!("{} as usize", param.name));
        }
    }

    // Pad to the smallest supported arity.
    let arity = match args.len() {
        0..=3 => 3,
        4..=6 => 6,
        7..=9 => 9,
        _ => return Err(Error::TooManyArgs(f.name.clone())),
    };
    args.resize(arity, "0".into());

    // Assign result registers to the non-error returns in declaration
    // order. With an error return the third register is the error
    // register, leaving two value registers; without one, all three are
    // available.
    let limit = if has_err { 2 } else { 3 };
    let mut used = [false; 3];
    let mut convs = Vec::new();
    let mut next = 0;
    for ret in f.rets.iter().filter(|v| !v.is_error()) {
        let ty = proto::rust_type(&ret.ty);
        let expr = if ret.is_wide() && p.width != profile::Width::W64 {
            if next + 1 >= limit {
                return Err(Error::Registers(f.name.clone()));
            }
            let (hi, lo) = match p.width.endianness() {
                Some(profile::Endianness::Big) => (next, next + 1),
                _ => (next + 1, next),
            };
            used[next] = true;
            used[next + 1] = true;
            next += 2;
            format!("((r{} as u64) << 32 | r{} as u64) as {}", hi, lo, ty)
        } else {
            if next >= limit {
                return Err(Error::Registers(f.name.clone()));
            }
            let reg = next;
            used[reg] = true;
            next += 1;
            if ret.ty == "bool" {
                format!("r{} != 0", reg)
            } else {
                format!("r{} as {}", reg, ty)
            }
        };
        convs.push(Conv {
            name: ret.name.clone(),
            expr: expr,
        });
    }

    // Select the failure check. The Plan9 check reads the primary result
    // register, so it must be captured even without a value return.
    let check = match (has_err, p.family) {
        (false, _) => Check::None,
        (true, profile::OsFamily::Plan9) => {
            used[0] = true;
            Check::Plan9
        },
        (true, _) => Check::Errno,
    };

    // Select the dispatch primitive. The no-error primitive exists only
    // on the generic family and exposes two registers, so a captured
    // third register forces the full primitive.
    let no_error = !has_err && p.family == profile::OsFamily::Generic && !used[2];
    let base = if f.blocking { "syscall" } else { "raw_syscall" };
    let mut dispatch = base.to_string();
    if arity > 3 {
        dispatch.push_str(&arity.to_string());
    }
    if no_error {
        dispatch.push_str("_no_error");
    }

    let reg_name = |used: bool, name: &str| {
        if used { name.to_string() } else { "_".to_string() }
    };
    let capture = if !used[0] && !used[1] && !used[2] && !has_err {
        Capture::Bare
    } else if no_error {
        Capture::Pair([
            reg_name(used[0], "r0"),
            reg_name(used[1], "r1"),
        ])
    } else {
        let third = if has_err {
            "e1".to_string()
        } else {
            reg_name(used[2], "r2")
        };
        Capture::Triple([
            reg_name(used[0], "r0"),
            reg_name(used[1], "r1"),
            third,
        ])
    };

    Ok(Plan {
        preps: preps,
        args: args,
        arity: arity,
        dispatch: dispatch,
        capture: capture,
        convs: convs,
        check: check,
        warnings: warnings,
    })
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        match self {
            Self::TooManyArgs(v) => fmt.write_fmt(core::format_args!("{}: too many arguments", v)),
            Self::Registers(v) => fmt.write_fmt(core::format_args!("{}: not enough registers for 64-bit return", v)),
        }
    }
}
