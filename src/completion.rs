//! # Shell Completion Module
//!
//! Completion scripts via `clap_complete`, plus the mood vocabulary for
//! dynamic completion of mood arguments.
//!
//! ```bash
//! moodmix completion bash > ~/.local/share/bash-completion/completions/moodmix
//! moodmix completion zsh > ~/.config/zsh/completions/_moodmix
//! ```

use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io;

use crate::cli::Shell;
use crate::mood::Mood;

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

/// Convert our Shell enum to clap_complete's Shell enum
#[must_use]
pub fn shell_to_completion_shell(shell: Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// Mood names offered for completion
#[must_use]
pub fn mood_completions() -> Vec<&'static str> {
    Mood::ALL.iter().map(|m| m.as_str()).collect()
}

pub fn print_mood_completions() {
    for mood in mood_completions() {
        println!("{mood}");
    }
}
