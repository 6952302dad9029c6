use crate::output::Output;
use color_eyre::Result;
use dialoguer::Confirm;

/// Yes/no prompt. A closed terminal or Ctrl-C is an error, not a "no".
pub fn confirm(prompt: &str, default: bool, output: &Output) -> Result<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(|e| {
            output.error(format!("Failed to read confirmation: {}", e));
            color_eyre::eyre::eyre!("Failed to read confirmation: {}", e)
        })
}
