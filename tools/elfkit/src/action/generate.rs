//! Generation of executables that print a message.

use anyhow::{Context, Result};
use elf::builder::{BuildConfig, ExecutableLayout, write_executable};

use crate::{cli::generate::GenerateConfig, file::FileSink};

/// Writes the executable described by `config` and returns its layout.
///
/// # Errors
///
/// Returns an error if the message or base address cannot be encoded, or if the file cannot be
/// written. On error, any existing file at the path is left unchanged.
pub fn generate(config: &GenerateConfig) -> Result<ExecutableLayout> {
    let build_config = BuildConfig {
        base_address: config.base_address,
        ..BuildConfig::default()
    };

    // The sink stages into a temporary file, so a failed build leaves `config.path` untouched.
    let mut sink = FileSink::create(&config.path);
    let layout = write_executable(&mut sink, config.message.as_bytes(), &build_config)
        .with_context(|| format!("failed to generate \"{}\"", config.path.display()))?;

    log::info!(
        "generated \"{}\": code at {:#x}, message at {:#x}",
        config.path.display(),
        layout.code_address,
        layout.data_address
    );
    Ok(layout)
}
