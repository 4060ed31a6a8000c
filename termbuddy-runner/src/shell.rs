//! Shell detection.

use std::path::Path;

const CANDIDATES: [&str; 7] = [
    "/usr/bin/zsh",
    "/usr/bin/fish",
    "/usr/bin/bash",
    "/bin/bash",
    "/bin/zsh",
    "/bin/fish",
    "/bin/sh",
];

/// Pick the shell to execute commands under: an explicit `TERMBUDDY_SHELL`
/// override, then the login shell from `SHELL`, then well-known paths.
/// Always returns something; `/bin/sh` is the last resort.
pub fn detect_shell() -> String {
    for var in ["TERMBUDDY_SHELL", "SHELL"] {
        if let Ok(shell) = std::env::var(var)
            && !shell.is_empty()
            && Path::new(&shell).exists()
        {
            return shell;
        }
    }
    for candidate in CANDIDATES {
        if Path::new(candidate).exists() {
            return candidate.to_string();
        }
    }
    "/bin/sh".to_string()
}
