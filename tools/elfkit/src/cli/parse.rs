//! Command line parsing and [`Action::Parse`][ap] construction.
//!
//! [ap]: crate::cli::Action::Parse

use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};

/// Description of which file to inspect and how much of it to print.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ParseConfig {
    /// The path of the ELF executable to inspect.
    pub path: PathBuf,
    /// Whether the machine code at the entry point should be extracted and printed.
    pub extract_code: bool,
}

/// Parses the arguments required to produce a valid [`ParseConfig`].
pub fn parse_arguments(matches: &ArgMatches) -> ParseConfig {
    let path = matches
        .get_one::<PathBuf>("file")
        .cloned()
        .unwrap_or_else(|| unreachable!("`file` is a required argument"));

    let extract_code = !matches.get_flag("no-code");

    ParseConfig { path, extract_code }
}

/// Returns the command parser for an [`Action::Parse`][ap].
///
/// [ap]: crate::cli::Action::Parse
pub fn subcommand_parser() -> Command {
    let file = Arg::new("file")
        .value_name("FILE")
        .help("The ELF executable to inspect")
        .value_parser(value_parser!(PathBuf))
        .required(true);

    let no_code = Arg::new("no-code")
        .long("no-code")
        .help("Do not extract the machine code at the entry point")
        .action(ArgAction::SetTrue);

    Command::new("parse")
        .about("Prints the identification, file header and program headers of an ELF executable")
        .arg(file)
        .arg(no_code)
}
