//! # Shim Emission
//!
//! This module renders one function descriptor plus its marshaling plan
//! into concrete shim source text, and assembles the final output unit
//! around the rendered functions: the invocation header, the optional
//! conditional-compilation attribute, and the import block.
//!
//! Emission is byte-deterministic for identical input and profile. The
//! generated files are meant to be checked into version control, so
//! repeated runs must produce identical diffs.

use crate::abi;
use crate::proto;

/// Banner prepended to every rendered function.
const FN_BANNER: &str = "// THIS FILE IS GENERATED BY THE COMMAND AT THE TOP; DO NOT EDIT";

/// Yield the namespace qualifier for generated references into the
/// support module. The qualifier is dropped when the output unit lives in
/// the support module itself.
pub fn namespace(module: &str) -> &'static str {
    if module == "sys" {
        ""
    } else {
        "sys::"
    }
}

// Render the return type of a shim signature, or `None` for a unit
// function.
fn ret_type(f: &proto::Proto, ns: &str) -> Option<String> {
    let values: Vec<String> = f.rets
        .iter()
        .filter(|v| !v.is_error())
        .map(|v| proto::rust_type(&v.ty))
        .collect();

    let value = match values.len() {
        0 => "()".to_string(),
        1 => values[0].clone(),
        _ => format!("({})", values.join(", ")),
    };

    if f.has_error_ret() {
        Some(format!("Result<{}, {}Errno>", value, ns))
    } else if values.is_empty() {
        None
    } else {
        Some(value)
    }
}

// Render the final value expression of a shim body: the captured return
// values in declaration order.
fn ret_value(plan: &abi::Plan) -> String {
    match plan.convs.len() {
        0 => "()".to_string(),
        1 => plan.convs[0].name.clone(),
        _ => {
            let names: Vec<&str> = plan.convs.iter().map(|v| v.name.as_str()).collect();
            format!("({})", names.join(", "))
        },
    }
}

/// Render one function descriptor and its marshaling plan as shim source
/// text, including the per-function banner.
pub fn render_fn(f: &proto::Proto, plan: &abi::Plan, module: &str) -> String {
    let ns = namespace(module);
    let mut out = String::new();

    out.push_str(FN_BANNER);
    out.push_str("\n\n");

    // Signature.
    let params: Vec<String> = f.params
        .iter()
        .map(|v| format!("{}: {}", v.name, proto::rust_type(&v.ty)))
        .collect();
    out.push_str(&format!("pub unsafe fn {}({})", f.name, params.join(", ")));
    if let Some(ty) = ret_type(f, ns) {
        out.push_str(&format!(" -> {}", ty));
    }
    out.push_str(" {\n");

    // Temp bindings in parameter order.
    for prep in plan.preps.iter() {
        match prep {
            abi::Prep::Str { temp, param, fallible: true } => {
                out.push_str(&format!("    let {} = {}byte_ptr_from_str({})?;\n", temp, ns, param));
            },
            abi::Prep::Str { temp, param, fallible: false } => {
                out.push_str(&format!(
                    "    let {} = {}byte_ptr_from_str({}).unwrap_or(core::ptr::null());\n",
                    temp, ns, param,
                ));
            },
            abi::Prep::Slice { temp, param } => {
                out.push_str(&format!(
                    "    let {} = if {}.is_empty() {{ core::ptr::addr_of!({}ZERO) as usize }} else {{ {}.as_ptr() as usize }};\n",
                    temp, param, ns, param,
                ));
            },
            abi::Prep::Bool { temp, param } => {
                out.push_str(&format!(
                    "    let {} = if {} {{ 1usize }} else {{ 0usize }};\n",
                    temp, param,
                ));
            },
        }
    }

    // Dispatch call.
    let call = format!(
        "{}{}({}{}, {})",
        ns,
        plan.dispatch,
        ns,
        f.call_id,
        plan.args.join(", "),
    );
    match &plan.capture {
        abi::Capture::Bare => {
            out.push_str(&format!("    {};\n", call));
        },
        abi::Capture::Pair([a, b]) => {
            out.push_str(&format!("    let ({}, {}) = {};\n", a, b, call));
        },
        abi::Capture::Triple([a, b, c]) => {
            out.push_str(&format!("    let ({}, {}, {}) = {};\n", a, b, c, call));
        },
    }

    // Result conversions in return-declaration order.
    for conv in plan.convs.iter() {
        out.push_str(&format!("    let {} = {};\n", conv.name, conv.expr));
    }

    // Failure check of the target OS family.
    match plan.check {
        abi::Check::None => {},
        abi::Check::Errno => {
            out.push_str("    if e1 != 0 {\n");
            out.push_str(&format!("        return Err({}errno(e1));\n", ns));
            out.push_str("    }\n");
        },
        abi::Check::Plan9 => {
            out.push_str("    if r0 as i32 == -1 {\n");
            out.push_str(&format!("        return Err({}errno(e1));\n", ns));
            out.push_str("    }\n");
        },
    }

    // Final return.
    if f.has_error_ret() {
        out.push_str(&format!("    Ok({})\n", ret_value(plan)));
    } else if !plan.convs.is_empty() {
        out.push_str(&format!("    {}\n", ret_value(plan)));
    }

    out.push_str("}\n");
    out
}

/// Assemble the final output unit: the invocation header echoing the
/// exact command that produced the file, the optional
/// conditional-compilation attribute, the import block, and one rendered
/// function per prototype in input order.
pub fn unit(
    invocation: &str,
    tags: Option<&str>,
    module: &str,
    functions: &[String],
) -> String {
    let mut out = String::new();

    out.push_str(&format!("// {}\n", invocation));
    out.push_str("// Code generated by the command above; DO NOT EDIT.\n");

    if let Some(tags) = tags {
        out.push_str(&format!("\n#![cfg({})]\n", tags));
    }

    // Import block, deduplicated and sorted, minus the unit's own
    // namespace.
    let own = format!("crate::{}", module);
    let mut imports = std::collections::BTreeSet::new();
    imports.insert("crate::sys".to_string());
    imports.remove(&own);
    if !imports.is_empty() {
        out.push('\n');
        for import in imports.iter() {
            out.push_str(&format!("use {};\n", import));
        }
    }

    for f in functions.iter() {
        out.push('\n');
        out.push_str(f);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile;

    fn generic64() -> profile::Profile {
        profile::Profile {
            width: profile::Width::W64,
            family: profile::OsFamily::Generic,
            arm: false,
        }
    }

    fn render(line: &str, p: &profile::Profile, module: &str) -> String {
        let f = proto::Proto::parse(line).unwrap().unwrap();
        let plan = abi::lower(&f, p).unwrap();
        render_fn(&f, &plan, module)
    }

    // Verify the full rendering of a shim with a string parameter, a
    // value return, and the errno check.
    #[test]
    fn render_open() {
        let text = render(
            "//sys open(path string, mode int, perm int) (fd int, err error)",
            &generic64(),
            "unix",
        );

        assert_eq!(text, concat!(
            "// THIS FILE IS GENERATED BY THE COMMAND AT THE TOP; DO NOT EDIT\n",
            "\n",
            "pub unsafe fn open(path: &str, mode: isize, perm: isize) -> Result<isize, sys::Errno> {\n",
            "    let _p0 = sys::byte_ptr_from_str(path)?;\n",
            "    let (r0, _, e1) = sys::syscall(sys::SYS_OPEN, _p0 as usize, mode as usize, perm as usize);\n",
            "    let fd = r0 as isize;\n",
            "    if e1 != 0 {\n",
            "        return Err(sys::errno(e1));\n",
            "    }\n",
            "    Ok(fd)\n",
            "}\n",
        ));
    }

    // Verify the guarded sequence lowering and the nonblocking raw
    // primitive in the rendered text.
    #[test]
    fn render_read() {
        let text = render(
            "//sys-nonblocking read(fd int, p []byte) (n int, err error)",
            &generic64(),
            "unix",
        );

        assert_eq!(text, concat!(
            "// THIS FILE IS GENERATED BY THE COMMAND AT THE TOP; DO NOT EDIT\n",
            "\n",
            "pub unsafe fn read(fd: isize, p: &[u8]) -> Result<isize, sys::Errno> {\n",
            "    let _p0 = if p.is_empty() { core::ptr::addr_of!(sys::ZERO) as usize } else { p.as_ptr() as usize };\n",
            "    let (r0, _, e1) = sys::raw_syscall(sys::SYS_READ, fd as usize, _p0, p.len());\n",
            "    let n = r0 as isize;\n",
            "    if e1 != 0 {\n",
            "        return Err(sys::errno(e1));\n",
            "    }\n",
            "    Ok(n)\n",
            "}\n",
        ));
    }

    // Verify the namespace rule: qualifiers are dropped when the unit
    // lives in the support module itself.
    #[test]
    fn render_own_module() {
        let text = render(
            "//sys open(path string, mode int, perm int) (fd int, err error)",
            &generic64(),
            "sys",
        );

        assert!(text.contains("-> Result<isize, Errno> {"));
        assert!(text.contains("let _p0 = byte_ptr_from_str(path)?;"));
        assert!(text.contains("syscall(SYS_OPEN, "));
        assert!(text.contains("return Err(errno(e1));"));
    }

    // Verify the Plan9 failure check in the rendered text.
    #[test]
    fn render_plan9() {
        let p = profile::Profile {
            width: profile::Width::W32Little,
            family: profile::OsFamily::Plan9,
            arm: false,
        };
        let text = render("//sys remove(path string) (err error)", &p, "plan9");

        assert!(text.contains("    if r0 as i32 == -1 {\n"));
        assert!(text.contains("        return Err(sys::errno(e1));\n"));
        assert!(text.contains("    Ok(())\n"));
    }

    // Verify a unit function with a silently discarded string-conversion
    // failure.
    #[test]
    fn render_infallible_string() {
        let text = render("//sys-nonblocking setname(name string)", &generic64(), "unix");

        assert!(text.contains("pub unsafe fn setname(name: &str) {\n"));
        assert!(text.contains("let _p0 = sys::byte_ptr_from_str(name).unwrap_or(core::ptr::null());\n"));
        assert!(text.contains("sys::raw_syscall_no_error(sys::SYS_SETNAME, _p0 as usize, 0, 0);\n"));
        assert!(!text.contains("Ok("));
    }

    // Verify a plain value return without an error: the captured value is
    // the tail expression.
    #[test]
    fn render_value_only() {
        let text = render("//sys-nonblocking getpid() (pid int)", &generic64(), "unix");

        assert!(text.contains("pub unsafe fn getpid() -> isize {\n"));
        assert!(text.contains("let (r0, _) = sys::raw_syscall_no_error(sys::SYS_GETPID, 0, 0, 0);\n"));
        assert!(text.ends_with("    let pid = r0 as isize;\n    pid\n}\n"));
    }

    // Verify the unit assembly: invocation header, conditional
    // compilation attribute, import block, function order.
    #[test]
    fn unit_assembly() {
        let text = unit(
            "mksyscall --openbsd --b32 --tags openbsd,386 sys.txt",
            Some("openbsd,386"),
            "unix",
            &["fn one\n".to_string(), "fn two\n".to_string()],
        );

        assert_eq!(text, concat!(
            "// mksyscall --openbsd --b32 --tags openbsd,386 sys.txt\n",
            "// Code generated by the command above; DO NOT EDIT.\n",
            "\n",
            "#![cfg(openbsd,386)]\n",
            "\n",
            "use crate::sys;\n",
            "\n",
            "fn one\n",
            "\n",
            "fn two\n",
        ));
    }

    // Verify the import block vanishes when the unit is the support
    // module itself.
    #[test]
    fn unit_own_module() {
        let text = unit("mksyscall sys.txt", None, "sys", &[]);

        assert_eq!(text, concat!(
            "// mksyscall sys.txt\n",
            "// Code generated by the command above; DO NOT EDIT.\n",
        ));
    }

    // Verify byte determinism: identical input renders identically across
    // independent runs.
    #[test]
    fn deterministic() {
        let line = "//sys pread(fd int, p []byte, offset int64) (n int, err error)";
        let p = profile::Profile {
            width: profile::Width::W32Big,
            family: profile::OsFamily::OpenBsd,
            arm: false,
        };

        assert_eq!(render(line, &p, "unix"), render(line, &p, "unix"));
    }
}
