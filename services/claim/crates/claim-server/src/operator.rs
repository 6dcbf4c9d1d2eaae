//! Operator-facing instructions for reading the challenge file.

use std::path::Path;

/// What to show an operator so they can read the challenge locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorCommand {
    /// The challenge path in the host's native form.
    pub display_path: String,
    /// Ready-to-run command that prints the challenge.
    pub command: String,
    /// Whether `command` wraps the path in double quotes.
    pub quoted: bool,
    pub help: &'static str,
}

/// Renders the challenge path as a local command for one host platform.
pub trait OperatorShell: Send + Sync {
    fn render(&self, path: &Path) -> OperatorCommand;
}

/// Unix-like hosts: the operator SSHes in and reads the file with `sudo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixShell;

/// Windows hosts: the operator opens a Command Prompt on the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsShell;

const POSIX_HELP: &str = "We need to verify this server is yours. SSH to this server and run \
     this command. It will give you a UUID. Copy and paste this UUID to this box:";

const WINDOWS_HELP: &str = "We need to verify this Windows server is yours. Open a Command \
     Prompt on this server and run this command. It will give you a UUID. Copy and paste this \
     UUID to this box:";

impl OperatorShell for PosixShell {
    fn render(&self, path: &Path) -> OperatorCommand {
        build("sudo cat", path.to_string_lossy().into_owned(), POSIX_HELP)
    }
}

impl OperatorShell for WindowsShell {
    fn render(&self, path: &Path) -> OperatorCommand {
        build(
            "more",
            path.to_string_lossy().replace('/', "\\"),
            WINDOWS_HELP,
        )
    }
}

fn build(prefix: &str, display_path: String, help: &'static str) -> OperatorCommand {
    let quoted = display_path.contains(' ');
    let command = if quoted {
        format!("{prefix} \"{display_path}\"")
    } else {
        format!("{prefix} {display_path}")
    };
    OperatorCommand {
        display_path,
        command,
        quoted,
        help,
    }
}

/// The shell matching the platform this binary was built for.
#[must_use]
pub fn native() -> &'static dyn OperatorShell {
    if cfg!(windows) {
        &WindowsShell
    } else {
        &PosixShell
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix_plain_path() {
        let cmd = PosixShell.render(Path::new("/var/lib/claimd/claim_session_id"));
        assert_eq!(cmd.display_path, "/var/lib/claimd/claim_session_id");
        assert_eq!(cmd.command, "sudo cat /var/lib/claimd/claim_session_id");
        assert!(!cmd.quoted);
        assert!(cmd.help.contains("SSH"));
    }

    #[test]
    fn posix_path_with_space_is_quoted() {
        let cmd = PosixShell.render(Path::new("/opt/my agent/claim_session_id"));
        assert_eq!(cmd.command, "sudo cat \"/opt/my agent/claim_session_id\"");
        assert!(cmd.quoted);
    }

    #[test]
    fn windows_uses_native_separators() {
        let cmd = WindowsShell.render(Path::new("C:/Program Files/claimd/claim_session_id"));
        assert_eq!(
            cmd.display_path,
            "C:\\Program Files\\claimd\\claim_session_id"
        );
        assert_eq!(
            cmd.command,
            "more \"C:\\Program Files\\claimd\\claim_session_id\""
        );
        assert!(cmd.help.contains("Command Prompt"));
    }

    #[cfg(unix)]
    #[test]
    fn native_is_posix_on_unix() {
        let cmd = native().render(Path::new("/x"));
        assert_eq!(cmd.command, "sudo cat /x");
    }
}
