pub mod cleanup;
pub mod clear;
pub mod prompts;
pub mod run;
