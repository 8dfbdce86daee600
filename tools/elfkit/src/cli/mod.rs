//! Command line parsing and [`Action`] construction.

use std::{ffi::OsString, process};

use clap::Command;

use crate::cli::{generate::GenerateConfig, parse::ParseConfig};

pub mod generate;
pub mod parse;

/// The exit status used when the command line is invalid.
pub const USAGE_EXIT_STATUS: i32 = 1;

/// The action to carry out.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Action {
    /// Print the structures of an ELF executable.
    Parse(ParseConfig),
    /// Generate an ELF executable that prints a message.
    Generate(GenerateConfig),
}

/// Parses `elfkit`'s arguments to construct an [`Action`].
///
/// Help and version requests are printed and exit successfully. Invalid command lines print
/// their usage to `stderr` and exit with [`USAGE_EXIT_STATUS`].
pub fn get_action() -> Action {
    match try_get_action_from(std::env::args_os()) {
        Ok(action) => action,
        Err(error) if error.use_stderr() => {
            if let Err(print_error) = error.print() {
                log::error!("failed to print usage: {print_error}");
            }
            process::exit(USAGE_EXIT_STATUS);
        }
        Err(error) => error.exit(),
    }
}

/// Parses `args` to construct an [`Action`].
///
/// The first item of `args` is the binary name.
///
/// # Errors
///
/// Returns [`clap::Error`] if `args` is invalid or requests help or version information.
pub fn try_get_action_from<I, T>(args: I) -> Result<Action, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = command_parser().try_get_matches_from(args)?;

    let Some((subcommand_name, subcommand_matches)) = matches.subcommand() else {
        unreachable!("subcommand is required");
    };
    let action = match subcommand_name {
        "parse" => Action::Parse(parse::parse_arguments(subcommand_matches)),
        "gen" => Action::Generate(generate::parse_arguments(subcommand_matches)),
        _ => unreachable!("unexpected subcommand: {subcommand_name:?}"),
    };

    Ok(action)
}

/// Returns the command parser for all [`Action`]s.
fn command_parser() -> Command {
    Command::new("elfkit")
        .about("Inspects 64-bit ELF executables and generates minimal ones")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand(parse::subcommand_parser())
        .subcommand(generate::subcommand_parser())
        .subcommand_required(true)
        .arg_required_else_help(true)
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use clap::error::ErrorKind;

    use super::{Action, try_get_action_from};
    use crate::cli::{generate::GenerateConfig, parse::ParseConfig};

    #[test]
    fn parse_subcommand() {
        assert_eq!(
            try_get_action_from(["elfkit", "parse", "a.out"]).unwrap(),
            Action::Parse(ParseConfig {
                path: PathBuf::from("a.out"),
                extract_code: true,
            })
        );
        assert_eq!(
            try_get_action_from(["elfkit", "parse", "--no-code", "a.out"]).unwrap(),
            Action::Parse(ParseConfig {
                path: PathBuf::from("a.out"),
                extract_code: false,
            })
        );
    }

    #[test]
    fn gen_subcommand() {
        assert_eq!(
            try_get_action_from(["elfkit", "gen", "hello", "Hello, world!"]).unwrap(),
            Action::Generate(GenerateConfig {
                path: PathBuf::from("hello"),
                message: "Hello, world!".to_owned(),
                base_address: 0x400000,
            })
        );
        assert_eq!(
            try_get_action_from(["elfkit", "gen", "--base-address", "0x800000", "hi", "Hi"])
                .unwrap(),
            Action::Generate(GenerateConfig {
                path: PathBuf::from("hi"),
                message: "Hi".to_owned(),
                base_address: 0x800000,
            })
        );
    }

    #[test]
    fn missing_arguments() {
        let error = try_get_action_from(["elfkit", "gen", "hello"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MissingRequiredArgument);
        assert!(error.use_stderr());

        let error = try_get_action_from(["elfkit", "parse"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn help_is_not_an_error() {
        let error = try_get_action_from(["elfkit", "help"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::DisplayHelp);
        assert!(!error.use_stderr());

        let error = try_get_action_from(["elfkit", "help", "gen"]).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn command_is_consistent() {
        super::command_parser().debug_assert();
    }
}
