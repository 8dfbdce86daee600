//! Inspects 64-bit ELF executables and generates minimal ones that print a message.

use std::io;

use anyhow::Result;
use elfkit::{
    action::{generate::generate, parse::parse},
    cli::{self, Action},
};

fn main() -> Result<()> {
    env_logger::init();

    match cli::get_action() {
        Action::Parse(config) => parse(&config, &mut io::stdout().lock())?,
        Action::Generate(config) => {
            let layout = generate(&config)?;
            println!(
                "generated \"{}\" ({} bytes, entry point {:#x})",
                config.path.display(),
                layout.file_size(),
                layout.entry
            );
        }
    }

    Ok(())
}
