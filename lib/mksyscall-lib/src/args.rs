//! # Program Arguments
//!
//! This module implements a basic command-line parser for runtime arguments
//! passed to a program. It supports long flags with optional inline values,
//! typed value sinks, and positional parameters. Sub-commands are not
//! supported; a single `Command` describes the entire interface.

/// Error definitions for all possible errors of the argument parser.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error<'args> {
    /// Specified flag contains invalid Unicode.
    FlagInvalidUnicode(&'args std::ffi::OsStr),
    /// Specified flag is not known.
    FlagUnknown(&'args str),
    /// Specified flag cannot take values.
    FlagTakesNoValue(&'args str, &'args std::ffi::OsStr),
    /// Specified flag needs a value.
    FlagNeedsValue(&'args str),
    /// Value parser for set-flag failed.
    FlagSetValue(&'args str, sink::Error),
    /// Value parser for parse-flag failed.
    FlagParseValue(&'args str, &'args std::ffi::OsStr, sink::Error),
    /// Short flags are not supported.
    ShortsUnknown(&'args std::ffi::OsStr),
    /// Parameter parser for the command failed.
    Parameter(String, &'args std::ffi::OsStr, sink::Error),
    /// The command takes no positional parameters.
    TakesNoParameters(String, &'args std::ffi::OsStr),
}

// Type alias for value parsers.
type Sink<'args, Source> = &'args dyn sink::Sink<Source>;

/// Location and parsing information for positional parameters. This defines
/// how parameters are processed when present.
pub type Parameters<'args> = Sink<'args, &'args std::ffi::OsStr>;

/// Location and parsing information for command-line flags. This defines
/// whether a flag takes a value, and how a flag is processed when present.
#[derive(Debug)]
#[non_exhaustive]
pub enum Value<'args> {
    Set(Sink<'args, ()>),
    Parse(Sink<'args, &'args std::ffi::OsStr>),
}

/// An audited list of command-line configuration.
///
/// This type encodes auditing guarantees in the type-system. It takes user
/// configuration, audits it, and then provides a wrapper type to ensure the
/// auditing is encoded in the type-system.
#[derive(Debug)]
#[repr(transparent)]
pub struct AuditedList<T: ?Sized> {
    list: T,
}

/// Definition of a command-line flag. This carries all information required
/// to parse a specific flag on the command-line and store parsed information.
#[derive(Debug)]
pub struct Flag<'args, 'ctx> {
    name: &'ctx str,
    value: Value<'args>,

    help_short: Option<&'ctx str>,
}

/// An audited list of command-line flags.
pub type FlagList<'args, 'ctx, const N: usize> = AuditedList<[Flag<'args, 'ctx>; N]>;

/// A reference to an audited list of command-line flags.
pub type FlagListRef<'args, 'ctx> = &'ctx AuditedList<[Flag<'args, 'ctx>]>;

/// Definition of the command-line interface of a program: its name, its
/// flags, and how positional parameters are handled.
#[derive(Debug)]
pub struct Command<'args, 'ctx> {
    name: &'ctx str,
    flags: FlagListRef<'args, 'ctx>,
    parameters: Option<Parameters<'args>>,

    help_short: Option<&'ctx str>,
}

/// Command-line parser setup, which encapsulates operational flags as well as
/// possible caches for repeated parser operations.
#[derive(Debug)]
pub struct Parser {
}

/// Flag collector for standard `--help` flags. It implements `sink::Sink`
/// and remembers whether the flag was present.
#[derive(Debug)]
pub struct Help {
    cell: core::cell::RefCell<bool>,
}

impl<'args> core::fmt::Display for Error<'args> {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        match self {
            Self::FlagInvalidUnicode(flag) => fmt.write_fmt(core::format_args!("Flag name contains invalid Unicode: {}", flag.to_string_lossy())),
            Self::FlagUnknown(flag) => fmt.write_fmt(core::format_args!("Invalid flag name: --{}", flag)),
            Self::FlagTakesNoValue(flag, value) => fmt.write_fmt(core::format_args!("Flag takes no value: --{}={}", flag, value.to_string_lossy())),
            Self::FlagNeedsValue(flag) => fmt.write_fmt(core::format_args!("Flag requires a value: --{}", flag)),
            Self::FlagSetValue(flag, e) => fmt.write_fmt(core::format_args!("Cannot parse value for flag `--{}`: {}", flag, e)),
            Self::FlagParseValue(flag, v, e) => fmt.write_fmt(core::format_args!("Cannot parse value for flag `--{}={}`: {}", flag, v.to_string_lossy(), e)),
            Self::ShortsUnknown(flags) => fmt.write_fmt(core::format_args!("Invalid short flags: {}", flags.to_string_lossy())),
            Self::Parameter(cmd, v, e) => fmt.write_fmt(core::format_args!("Cannot parse parameter for `{} {}`: {}", cmd, v.to_string_lossy(), e)),
            Self::TakesNoParameters(cmd, v) => fmt.write_fmt(core::format_args!("Invalid parameters for command: {} {}", cmd, v.to_string_lossy())),
        }
    }
}

// Allow creation of empty lists for all audited lists. This requires all
// implementors to allow empty lists without auditing.
impl<'a, T> Default for &'a AuditedList<[T]> {
    fn default() -> Self {
        &AuditedList::<[T; 0]> {
            list: [],
        }
    }
}

impl<'args, 'ctx> Flag<'args, 'ctx> {
    /// Create a command-line flag definition with the specified name and
    /// value location. All other properties of the flag will assume their
    /// defaults.
    pub fn with_name(
        name: &'ctx str,
        value: Value<'args>,
        help_short: Option<&'ctx str>,
    ) -> Self {
        Self {
            name: name,
            value: value,

            help_short: help_short,
        }
    }
}

impl<'args, 'ctx, const N: usize> FlagList<'args, 'ctx, N> {
    /// Create an audited list of command-line flags from user configuration.
    /// This will sort the flag array by their names and thus allow faster
    /// searches.
    pub fn with(mut list: [Flag<'args, 'ctx>; N]) -> Self {
        list.sort_unstable_by_key(|v| v.name);
        Self {
            list: list,
        }
    }
}

impl<'args, 'ctx> Command<'args, 'ctx> {
    /// Create a command-line interface definition with the specified name,
    /// flags, and parameter parser.
    pub fn with_name(
        name: &'ctx str,
        flags: FlagListRef<'args, 'ctx>,
        parameters: Option<Parameters<'args>>,
        help_short: Option<&'ctx str>,
    ) -> Self {
        Self {
            name: name,
            flags: flags,
            parameters: parameters,
            help_short: help_short,
        }
    }

    fn find_flag(
        &self,
        name: &str,
    ) -> Option<&'ctx Flag<'args, 'ctx>> {
        match self.flags.list.binary_search_by_key(
            &name,
            |v| v.name,
        ) {
            Ok(v) => Some(&self.flags.list[v]),
            _ => None,
        }
    }

    /// Write usage information to the specified format stream. This will
    /// include short explanations for the individual flags.
    pub fn help(
        &self,
        dst: &mut dyn core::fmt::Write,
    ) -> Result<(), core::fmt::Error> {
        // Start with one-line description.
        if let Some(v) = self.help_short {
            dst.write_fmt(core::format_args!("{}\n\n", v))?;
        }

        // Follow with usage information.
        let usage = match (
            self.flags.list.len() > 0,
            self.parameters.is_some(),
        ) {
            (false, false) => "",
            (false, true) => " <FILE>...",
            (true, false) => " [OPTIONS]",
            (true, true) => " [OPTIONS] <FILE>...",
        };
        dst.write_fmt(core::format_args!("Usage: {}{}\n", self.name, usage))?;

        // List all options.
        let mut flags = self.flags.list.iter()
            .filter(|v| v.help_short.is_some())
            .peekable();
        if flags.peek().is_some() {
            dst.write_str("\nOptions:\n")?;

            let maxlen = flags.clone()
                .map(|v| v.name.len())
                .max()
                .unwrap();

            for flag in flags {
                dst.write_fmt(core::format_args!(
                    "    --{0:1$}  {2}\n",
                    flag.name,
                    maxlen,
                    flag.help_short.unwrap(),
                ))?;
            }
        }

        Ok(())
    }
}

impl Parser {
    /// Create a new command-line parser with the default settings. This
    /// parser can be used to parse multiple command-lines, if desired.
    pub fn new() -> Self {
        Self {
        }
    }

    fn parse_flag<'args, 'ctx, Source>(
        &mut self,
        arguments: &mut Source,
        command: &'ctx Command<'args, 'ctx>,
        flag_str: &'args str,
        value_opt: Option<&'args std::ffi::OsStr>,
    ) -> Result<(), Error<'args>>
    where
        Source: Iterator<Item = &'args std::ffi::OsStr>,
    {
        let flag = match command.find_flag(flag_str) {
            Some(v) => v,
            None => return Err(Error::FlagUnknown(flag_str)),
        };

        match (&flag.value, value_opt) {
            (Value::Set(_), Some(v)) => {
                // Flag is nullary but a value was assigned inline. Signal an
                // error and ignore the argument.
                Err(Error::FlagTakesNoValue(flag_str, v))
            },
            (Value::Set(s), None) => {
                // Correct use of settable-flag.
                s.push(()).map_err(
                    |e| Error::FlagSetValue(flag_str, e),
                )
            },
            (Value::Parse(s), None) => {
                // Flag requires a value, so fetch it.
                match arguments.next() {
                    None => Err(Error::FlagNeedsValue(flag_str)),
                    Some(v) => s.push(v).map_err(
                        |e| Error::FlagParseValue(flag_str, v, e),
                    )
                }
            },
            (Value::Parse(s), Some(v)) => {
                // Flag requires a value that was passed inline.
                s.push(v).map_err(
                    |e| Error::FlagParseValue(flag_str, v, e),
                )
            },
        }
    }

    fn parse_parameter<'args, 'ctx>(
        &mut self,
        command: &'ctx Command<'args, 'ctx>,
        arg_os: &'args std::ffi::OsStr,
    ) -> Result<(), Error<'args>> {
        if let Some(ref v) = command.parameters {
            v.push(arg_os).map_err(
                |e| Error::Parameter(command.name.into(), arg_os, e),
            )
        } else {
            Err(Error::TakesNoParameters(command.name.into(), arg_os))
        }
    }

    /// Parse all arguments as command-line arguments for the specified
    /// command definition. All command-line flags are handled via the
    /// specified value handlers of the command definition.
    ///
    /// ## Errors
    ///
    /// The parser continues operation when encountering a parsing error. All
    /// errors will be collected and then returned to the caller. This allows
    /// producing combined diagnostics for multiple errors, if desired.
    pub fn parse<'args, 'ctx, Source>(
        &mut self,
        mut arguments: Source,
        command: &'ctx Command<'args, 'ctx>,
    ) -> Result<(), Box<[Error<'args>]>>
    where
        Source: Iterator<Item = &'args std::ffi::OsStr>,
    {
        let mut errors = Vec::new();

        loop {
            let arg_os = match arguments.next() {
                None => break,
                Some(v) => v,
            };

            // Get the UTF-8 prefix of the argument. Anything we can parse
            // must be valid UTF-8, but some of it might be trailed by
            // arbitrary OS data (e.g., `--output=./some/path` can contain
            // trailing non-UTF-8 data). This performs a UTF-8 check on all
            // arguments, but avoids any allocation.
            let arg_bytes = arg_os.as_encoded_bytes();
            let (arg_front, arg_tail) = match core::str::from_utf8(arg_bytes) {
                Ok(v) => (v, false),
                Err(e) => unsafe {
                    // SAFETY: `Utf8Error::valid_up_to()` points exactly at
                    //         the first byte past a valid UTF-8 section, so
                    //         we can safely cast it to a `str` unchecked.
                    let v = &arg_bytes[..e.valid_up_to()];
                    (core::str::from_utf8_unchecked(v), true)
                },
            };

            if let Some(arg_front_dd) = arg_front.strip_prefix("--") {
                // This argument starts with `--` and thus specifies a flag.
                // This can be one of: `--`, `--flag`, `--flag=value`. So
                // first decode the argument into flag and value, then handle
                // the distinct cases.
                let (flag, unknown, value) = match arg_front_dd.split_once('=') {
                    None => (arg_front_dd, arg_tail, None),
                    Some((before, _)) => {
                        let v = unsafe {
                            // SAFETY: We split off a well-defined UTF-8
                            //         sequence, which is allowed for
                            //         `std::ffi::OsStr`.
                            std::ffi::OsStr::from_encoded_bytes_unchecked(
                                &arg_bytes[2+before.len()+1..],
                            )
                        };
                        (before, false, Some(v))
                    },
                };

                match (flag, unknown, value) {
                    (_, true, _) => {
                        // We have invalid UTF-8 as part of the flag name
                        // (i.e., before any possible `=`). This cannot match
                        // any flag we know, so signal an error and ignore it.
                        errors.push(Error::FlagInvalidUnicode(arg_os));
                    },

                    ("", false, None) => {
                        // We got an empty flag. This ends all parsing and
                        // forwards the remaining arguments as parameters.
                        while let Some(v) = arguments.next() {
                            if let Err(e) = self.parse_parameter(command, v) {
                                errors.push(e);
                            }
                        }
                    },

                    (_, false, _) => {
                        // We got a complete flag with or without value. Look
                        // up the flag and pass the value along, if required.
                        if let Err(e) = self.parse_flag(&mut arguments, command, flag, value) {
                            errors.push(e);
                        }
                    },
                }
            } else if arg_bytes.len() >= 2 && arg_bytes[0] == b'-' {
                // A list of short flags was given. Our configuration does not
                // allow specifying short options, so none of these can ever
                // match. Note that a single dash without following flags has
                // no special meaning and we avoid handling it here.
                errors.push(Error::ShortsUnknown(arg_os));
            } else {
                // This argument is a positional parameter of the command.
                if let Err(e) = self.parse_parameter(command, arg_os) {
                    errors.push(e);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.into_boxed_slice())
        }
    }

    /// Parse all arguments as command-line arguments.
    ///
    /// This variant requires the arguments to be valid Rust strings. See
    /// `Self::parse()` for details on the operation.
    pub fn parse_str<'args, 'ctx, Source, SourceItem>(
        &mut self,
        arguments: Source,
        command: &'ctx Command<'args, 'ctx>,
    ) -> Result<(), Box<[Error<'args>]>>
    where
        Source: IntoIterator<Item = &'args SourceItem>,
        SourceItem: AsRef<str> + 'args,
    {
        self.parse(
            arguments.into_iter().map(|v| std::ffi::OsStr::new(v.as_ref())),
            command,
        )
    }

    /// Parse all arguments as command-line arguments.
    ///
    /// This variant takes arguments as `std::ffi::OsStr`. See
    /// `Self::parse()` for details on the operation.
    pub fn parse_osstr<'args, 'ctx, Source, SourceItem>(
        &mut self,
        arguments: Source,
        command: &'ctx Command<'args, 'ctx>,
    ) -> Result<(), Box<[Error<'args>]>>
    where
        Source: IntoIterator<Item = &'args SourceItem>,
        SourceItem: AsRef<std::ffi::OsStr> + 'args,
    {
        self.parse(
            arguments.into_iter().map(|v| v.as_ref()),
            command,
        )
    }
}

impl Help {
    /// Create a new context for handling of common `--help` arguments.
    pub fn new() -> Self {
        Self {
            cell: core::cell::RefCell::new(false),
        }
    }

    /// Try handling any `--help` arguments. This will return `true` if this
    /// command-line flag was set, otherwise `false` is returned.
    /// Furthermore, if set, it will write respective usage information to
    /// the specified destination.
    pub fn help<'args, 'ctx>(
        &self,
        command: &'ctx Command<'args, 'ctx>,
        dst: &mut dyn core::fmt::Write,
    ) -> Result<bool, core::fmt::Error> {
        if *self.cell.borrow() {
            command.help(dst)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

impl sink::Sink<()> for Help {
    fn push(
        &self,
        _data: (),
    ) -> Result<(), sink::Error> {
        self.cell.replace(true);
        Ok(())
    }
}

pub mod sink {
    //! # Interfaces for Generic Data Sinks
    //!
    //! Data sinks allow generalizing the way how data is collected or
    //! stored. The `SinkMut` trait defines how any type can accept specific
    //! input data and store it, possibly raising errors if the data could
    //! not be parsed. The `Sink` trait defines a variant for sinks with
    //! interior mutability.

    /// Enumeration of errors that can be raised by data sinks. The
    /// enumeration is not exhaustive and uncaught errors must be handled by
    /// callers.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum Error {
        /// Value was not valid for this data parser
        ValueInvalid,
        /// Data was not encoded as valid Unicode
        UnicodeInvalid,
    }

    /// Generic data sink with inherited mutability. It defines how data is
    /// collected and stored, providing a uniform interface to the caller.
    pub trait SinkMut<Source>
    where
        Self: core::fmt::Debug,
    {
        /// Push data into the sink, reporting whether it was stored
        /// successfully. Usually, this requires the implementor to parse
        /// the input data (if necessary) and then store it.
        ///
        /// It is up to the implementor to decide whether new data overrides
        /// old data, or whether it is amended.
        fn push(
            &mut self,
            data: Source,
        ) -> Result<(), Error>;
    }

    /// Generic data sink with interior mutability. It defines how data is
    /// collected and stored, providing a uniform interface to the caller.
    pub trait Sink<Source>
    where
        Self: core::fmt::Debug,
    {
        /// Push data into the sink, reporting whether it was stored
        /// successfully. Usually, this requires the implementor to parse
        /// the input data (if necessary) and then store it.
        fn push(
            &self,
            data: Source,
        ) -> Result<(), Error>;
    }

    impl core::fmt::Display for Error {
        fn fmt(&self, fmt: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
            match self {
                Self::ValueInvalid => fmt.write_str("Value is not valid"),
                Self::UnicodeInvalid => fmt.write_str("Value is not valid Unicode"),
            }
        }
    }

    impl SinkMut<()> for bool {
        fn push(
            &mut self,
            _data: (),
        ) -> Result<(), Error> {
            *self = true;
            Ok(())
        }
    }

    impl<'args> SinkMut<&'args std::ffi::OsStr> for &'args std::ffi::OsStr {
        fn push(
            &mut self,
            data: &'args std::ffi::OsStr,
        ) -> Result<(), Error> {
            *self = data;
            Ok(())
        }
    }

    impl<'args> SinkMut<&'args std::ffi::OsStr> for std::ffi::OsString {
        fn push(
            &mut self,
            data: &'args std::ffi::OsStr,
        ) -> Result<(), Error> {
            *self = data.into();
            Ok(())
        }
    }

    impl<'args> SinkMut<&'args std::ffi::OsStr> for &'args str {
        fn push(
            &mut self,
            data: &'args std::ffi::OsStr,
        ) -> Result<(), Error> {
            if let Some(data_str) = data.to_str() {
                *self = data_str;
                Ok(())
            } else {
                Err(Error::UnicodeInvalid)
            }
        }
    }

    impl<'args> SinkMut<&'args std::ffi::OsStr> for String {
        fn push(
            &mut self,
            data: &'args std::ffi::OsStr,
        ) -> Result<(), Error> {
            if let Some(data_str) = data.to_str() {
                *self = data_str.into();
                Ok(())
            } else {
                Err(Error::UnicodeInvalid)
            }
        }
    }

    impl<Source, Target> SinkMut<Source> for Option<Target>
    where
        Target: SinkMut<Source> + Default,
    {
        fn push(
            &mut self,
            data: Source,
        ) -> Result<(), Error> {
            self.get_or_insert_with(Default::default)
                .push(data)
        }
    }

    impl<Source, Target> SinkMut<Source> for Vec<Target>
    where
        Target: SinkMut<Source> + Default,
    {
        fn push(
            &mut self,
            data: Source,
        ) -> Result<(), Error> {
            let mut v: Target = Default::default();
            v.push(data)?;
            self.push(v);
            Ok(())
        }
    }

    impl<Source, Target> Sink<Source> for core::cell::RefCell<Target>
    where
        Target: SinkMut<Source>,
    {
        fn push(
            &self,
            data: Source,
        ) -> Result<(), Error> {
            self.borrow_mut().push(data)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, Eq, PartialEq)]
    struct Values {
        verbose: core::cell::RefCell<bool>,
        output: core::cell::RefCell<Option<String>>,
        tags: core::cell::RefCell<Option<String>>,
        files: core::cell::RefCell<Vec<String>>,
    }

    fn parse<'args>(
        arguments: &'args [&'args str],
        values: &'args Values,
    ) -> Result<(), Box<[Error<'args>]>> {
        let flags = FlagList::with([
            Flag::with_name("verbose", Value::Set(&values.verbose), None),
            Flag::with_name("output", Value::Parse(&values.output), None),
            Flag::with_name("tags", Value::Parse(&values.tags), None),
        ]);
        let cmd = Command::with_name("cmd", &flags, Some(&values.files), None);
        Parser::new().parse_str(arguments, &cmd)
    }

    // Verify basic flag parsing with detached values, inline values, and
    // positional parameters.
    #[test]
    fn test_basic() {
        let values: Values = Default::default();

        parse(
            &["--verbose", "--output", "out.rs", "--tags=linux", "a.rs", "b.rs"],
            &values,
        ).unwrap();

        assert_eq!(*values.verbose.borrow(), true);
        assert_eq!(*values.output.borrow(), Some("out.rs".into()));
        assert_eq!(*values.tags.borrow(), Some("linux".into()));
        assert_eq!(*values.files.borrow(), vec!["a.rs".to_string(), "b.rs".to_string()]);
    }

    // Verify that `--` terminates flag parsing and forwards the remaining
    // arguments as parameters.
    #[test]
    fn test_terminator() {
        let values: Values = Default::default();

        parse(
            &["--verbose", "--", "--output"],
            &values,
        ).unwrap();

        assert_eq!(*values.verbose.borrow(), true);
        assert_eq!(*values.output.borrow(), None);
        assert_eq!(*values.files.borrow(), vec!["--output".to_string()]);
    }

    // Verify the error batching of the parser: all parse errors of a single
    // run are collected and reported together.
    #[test]
    fn test_errors() {
        let values: Values = Default::default();

        let r = parse(
            &["--invalid", "--verbose=1", "-x", "--output"],
            &values,
        ).unwrap_err();

        assert_eq!(r.len(), 4);
        assert!(matches!(r[0], Error::FlagUnknown("invalid")));
        assert!(matches!(r[1], Error::FlagTakesNoValue("verbose", _)));
        assert!(matches!(r[2], Error::ShortsUnknown(_)));
        assert!(matches!(r[3], Error::FlagNeedsValue("output")));
    }

    // Verify that a command without a parameter sink rejects positional
    // parameters.
    #[test]
    fn test_no_parameters() {
        let files: core::cell::RefCell<Vec<String>> = Default::default();
        let flags = FlagList::with([
            Flag::with_name("files", Value::Parse(&files), None),
        ]);
        let cmd = Command::with_name("cmd", &flags, None, None);

        let arguments = ["stray"];
        let r = Parser::new().parse_str(&arguments, &cmd).unwrap_err();

        assert_eq!(r.len(), 1);
        assert!(matches!(r[0], Error::TakesNoParameters(ref v, _) if v == "cmd"));
    }
}
