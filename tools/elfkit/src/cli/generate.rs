//! Command line parsing and [`Action::Generate`][ag] construction.
//!
//! [ag]: crate::cli::Action::Generate

use std::{num::ParseIntError, path::PathBuf};

use clap::{Arg, ArgMatches, Command, value_parser};
use elf::builder::DEFAULT_BASE_ADDRESS;

/// Description of the executable to generate.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct GenerateConfig {
    /// The path at which the executable is created.
    pub path: PathBuf,
    /// The message the executable prints.
    pub message: String,
    /// The virtual address at which the executable is loaded.
    pub base_address: u64,
}

/// Parses the arguments required to produce a valid [`GenerateConfig`].
pub fn parse_arguments(matches: &ArgMatches) -> GenerateConfig {
    let path = matches
        .get_one::<PathBuf>("file")
        .cloned()
        .unwrap_or_else(|| unreachable!("`file` is a required argument"));

    let message = matches
        .get_one::<String>("message")
        .cloned()
        .unwrap_or_else(|| unreachable!("`message` is a required argument"));

    let base_address = matches
        .get_one::<u64>("base-address")
        .copied()
        .unwrap_or(DEFAULT_BASE_ADDRESS);

    GenerateConfig {
        path,
        message,
        base_address,
    }
}

/// Returns the command parser for an [`Action::Generate`][ag].
///
/// [ag]: crate::cli::Action::Generate
pub fn subcommand_parser() -> Command {
    let file = Arg::new("file")
        .value_name("FILE")
        .help("The path of the executable to create")
        .value_parser(value_parser!(PathBuf))
        .required(true);

    let message = Arg::new("message")
        .value_name("MESSAGE")
        .help("The message the executable prints")
        .value_parser(value_parser!(String))
        .required(true);

    let base_address = Arg::new("base-address")
        .long("base-address")
        .env("ELFKIT_BASE_ADDRESS")
        .value_name("ADDR")
        .help("The virtual address at which the executable is loaded [default: 0x400000]")
        .value_parser(parse_address);

    Command::new("gen")
        .about("Generates an x86_64 Linux executable that prints MESSAGE")
        .arg(file)
        .arg(message)
        .arg(base_address)
}

/// Parses a hexadecimal (`0x` prefixed) or decimal address.
fn parse_address(value: &str) -> Result<u64, ParseIntError> {
    match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    }
}

#[cfg(test)]
mod test {
    use super::parse_address;

    #[test]
    fn addresses() {
        assert_eq!(parse_address("0x400000"), Ok(0x400000));
        assert_eq!(parse_address("0X1000"), Ok(0x1000));
        assert_eq!(parse_address("4096"), Ok(4096));
        assert!(parse_address("0x").is_err());
        assert!(parse_address("banana").is_err());
    }
}
