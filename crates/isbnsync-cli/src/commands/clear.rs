use crate::commands::prompts;
use crate::output::Output;
use color_eyre::Result;
use isbnsync_config::{Config, PathManager};
use std::fs;
use std::path::PathBuf;

pub fn run_clear(config: &Config, path_manager: &PathManager, yes: bool, output: &Output) -> Result<()> {
    let files = progress_files(config, path_manager);

    if files.is_empty() {
        output.info("No progress files found to clear");
        return Ok(());
    }

    for file in &files {
        output.info(format!("  {}", file.display()));
    }
    if !yes && !prompts::confirm(&format!("Delete {} progress files?", files.len()), false, output)? {
        output.info("Cancelled; nothing deleted");
        return Ok(());
    }

    for file in &files {
        fs::remove_file(file)
            .map_err(|e| color_eyre::eyre::eyre!("Failed to remove {}: {}", file.display(), e))?;
    }
    output.success(format!("Cleared {} progress files", files.len()));
    Ok(())
}

/// Existing per-batch files, the consolidated file, and their `.bak` copies
fn progress_files(config: &Config, path_manager: &PathManager) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = config
        .resolved_batches(&path_manager.progress_dir())
        .into_iter()
        .map(|batch| batch.progress_file)
        .collect();
    candidates.push(path_manager.consolidated_file());

    let backups: Vec<PathBuf> = candidates
        .iter()
        .map(|path| {
            let mut name = path.as_os_str().to_owned();
            name.push(".bak");
            PathBuf::from(name)
        })
        .collect();
    candidates.extend(backups);

    candidates.dedup();
    candidates.into_iter().filter(|path| path.exists()).collect()
}
