use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

/// Kills processes by name when no child handle is tracked.
///
/// This is best-effort and collateral: every process with a matching name
/// is targeted, including ones this program never started.
pub trait FallbackKiller: Send + Sync {
    fn kill_by_name(&self, name: &str) -> std::io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Unix,
}

impl OsFamily {
    pub fn current() -> Self {
        if cfg!(windows) {
            OsFamily::Windows
        } else {
            OsFamily::Unix
        }
    }

    /// Program and arguments that kill every process called `name`.
    pub fn kill_command(&self, name: &str) -> (&'static str, Vec<String>) {
        match self {
            OsFamily::Windows => (
                "taskkill",
                vec!["/im".into(), format!("{name}.exe"), "/f".into()],
            ),
            OsFamily::Unix => ("pkill", vec![name.to_string()]),
        }
    }
}

/// Shells out to `taskkill` or `pkill`.
#[derive(Debug, Clone, Copy)]
pub struct SystemKiller {
    family: OsFamily,
}

impl Default for SystemKiller {
    fn default() -> Self {
        Self::new(OsFamily::current())
    }
}

impl SystemKiller {
    pub fn new(family: OsFamily) -> Self {
        Self { family }
    }
}

impl FallbackKiller for SystemKiller {
    fn kill_by_name(&self, name: &str) -> std::io::Result<()> {
        let (program, args) = self.family.kill_command(name);
        info!(program, ?args, "Killing processes by name");

        let mut child = Command::new(program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        // Reap in the background, the exit code only says whether anything matched
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => info!(program, %status, "Kill-by-name finished"),
                Err(error) => warn!(program, ?error, "Kill-by-name could not be reaped"),
            }
        });

        Ok(())
    }
}
