//! External tool invocation.
//!
//! Command templates come from configuration as either a shell-style string or
//! a pre-split argument list. [`invoke`] appends the renderer's positional
//! clause and classifies the outcome:
//! - program not on the search path: [`RenderError::ToolMissing`]
//! - non-zero exit: [`RenderError::ToolError`] with captured standard error
//! - any other launch failure: [`RenderError::Io`], which callers propagate

use std::fmt;
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::consts::{FALLBACK_SCRIPT, FALLBACK_SHELL, OUTPUT_FLAG};
use crate::error::RenderError;

/// Tool name used in renderer diagnostics.
pub(crate) const RENDERER: &str = "openscad";

/// Configured command template for an external tool.
///
/// A [`Line`](Self::Line) is split with POSIX shell-word rules (quotes and
/// backslash escapes honored, no variable or glob expansion).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize), serde(untagged))]
pub enum ToolCommand {
    /// Single string, e.g. `openscad --imgsize=800,600`.
    Line(String),
    /// Pre-tokenized argument list, e.g. `["openscad", "--imgsize=800,600"]`.
    Args(Vec<String>),
}

impl ToolCommand {
    /// Split the template into program and arguments.
    pub fn tokenize(&self, tool: &'static str) -> Result<Vec<String>, RenderError> {
        let args = match self {
            Self::Line(line) => shlex::split(line).ok_or_else(|| RenderError::InvalidCommand {
                tool,
                command: line.clone(),
                reason: "unbalanced quotes or trailing backslash",
            })?,
            Self::Args(args) => args.clone(),
        };
        if args.is_empty() {
            return Err(RenderError::InvalidCommand {
                tool,
                command: self.to_string(),
                reason: "no program given",
            });
        }
        Ok(args)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line(line) => f.write_str(line),
            Self::Args(args) => write!(f, "{args:?}"),
        }
    }
}

impl From<&str> for ToolCommand {
    fn from(line: &str) -> Self {
        Self::Line(line.to_owned())
    }
}

impl From<Vec<String>> for ToolCommand {
    fn from(args: Vec<String>) -> Self {
        Self::Args(args)
    }
}

/// Outcome of a child process that was started successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// Starts external processes.
///
/// The default [`ProcessLauncher`] spawns real child processes. Tests swap in
/// implementations that record command lines or simulate OS errors.
pub trait Launcher: Send + Sync {
    /// Run `args[0]` with the remaining arguments and wait for it to exit.
    ///
    /// Launch failures are returned as `Err` with the OS error intact so that
    /// callers can tell a missing program from other failures.
    fn launch(&self, args: &[String], cwd: Option<&Path>) -> io::Result<ToolOutput>;
}

/// [`Launcher`] backed by [`std::process::Command`].
///
/// Standard input, output and error are all piped. Input is closed
/// immediately, output is discarded and error is captured.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&self, args: &[String], cwd: Option<&Path>) -> io::Result<ToolOutput> {
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command line"))?;

        let mut command = Command::new(program);
        command
            .args(rest)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            // A missing cwd would otherwise surface as NotFound, i.e. a missing program
            if !dir.is_dir() {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("working directory {} does not exist", dir.display()),
                ));
            }
            command.current_dir(dir);
        }

        let output = command.output()?;
        Ok(ToolOutput {
            success: output.status.success(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Build the renderer command line.
///
/// The trailing clause is always `-o <output> <source>`: the renderer takes
/// its input as the last positional argument.
pub fn renderer_args(
    command: &ToolCommand,
    source_path: &Path,
    output_path: &Path,
) -> Result<Vec<String>, RenderError> {
    let mut args = command.tokenize(RENDERER)?;
    args.push(OUTPUT_FLAG.to_owned());
    args.push(output_path.to_string_lossy().into_owned());
    args.push(source_path.to_string_lossy().into_owned());
    Ok(args)
}

/// Run the renderer on `source_path`, writing `output_path`.
///
/// `cwd` is the directory the model was authored in, so that relative
/// `include`/`use` statements resolve. The output file is not checked here.
pub fn invoke(
    launcher: &dyn Launcher,
    command: &ToolCommand,
    source_path: &Path,
    output_path: &Path,
    cwd: &Path,
) -> Result<(), RenderError> {
    let args = renderer_args(command, source_path, output_path)?;
    run_tool(launcher, RENDERER, command, &args, Some(cwd), false)
}

/// Launch a tool and map the outcome onto [`RenderError`].
///
/// With `shell_fallback`, a program the OS refuses to execute (ENOEXEC, e.g. a
/// script without a shebang line) is retried once through [`FALLBACK_SHELL`].
pub(crate) fn run_tool(
    launcher: &dyn Launcher,
    tool: &'static str,
    command: &ToolCommand,
    args: &[String],
    cwd: Option<&Path>,
    shell_fallback: bool,
) -> Result<(), RenderError> {
    tracing::debug!(tool, ?args, ?cwd, "running external tool");

    let output = match launcher.launch(args, cwd) {
        Ok(output) => output,
        Err(err) if shell_fallback && is_not_executable(&err) => {
            tracing::debug!(tool, "not directly executable, retrying through {FALLBACK_SHELL}");
            launcher
                .launch(&shell_args(args), cwd)
                .map_err(|err| classify_launch_error(err, tool, command))?
        }
        Err(err) => return Err(classify_launch_error(err, tool, command)),
    };

    if !output.success {
        return Err(RenderError::ToolError {
            tool,
            message: output.stderr,
        });
    }
    Ok(())
}

/// Command line running `args` through [`FALLBACK_SHELL`].
fn shell_args(args: &[String]) -> Vec<String> {
    let mut shell_args = Vec::with_capacity(args.len() + 3);
    shell_args.push(FALLBACK_SHELL.to_owned());
    shell_args.push("-c".to_owned());
    shell_args.push(FALLBACK_SCRIPT.to_owned());
    shell_args.extend_from_slice(args);
    shell_args
}

fn classify_launch_error(err: io::Error, tool: &'static str, command: &ToolCommand) -> RenderError {
    if err.kind() == io::ErrorKind::NotFound {
        RenderError::ToolMissing {
            tool,
            command: command.to_string(),
        }
    } else {
        RenderError::Io(err)
    }
}

#[cfg(unix)]
fn is_not_executable(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ENOEXEC)
}

#[cfg(not(unix))]
fn is_not_executable(_err: &io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeLauncher, Step};
    use pretty_assertions::assert_eq;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_tokenize_line_honors_quotes() {
        let command = ToolCommand::from(r#"openscad --imgsize="800,600" -D 'label="a b"' x\ y"#);
        let args = command.tokenize(RENDERER).unwrap();
        assert_eq!(
            args,
            strings(&["openscad", "--imgsize=800,600", "-D", r#"label="a b""#, "x y"])
        );
    }

    #[test]
    fn test_tokenize_args_used_verbatim() {
        let command = ToolCommand::from(strings(&["open scad", "'quoted'"]));
        assert_eq!(
            command.tokenize(RENDERER).unwrap(),
            strings(&["open scad", "'quoted'"])
        );
    }

    #[test]
    fn test_tokenize_unbalanced_quotes() {
        let command = ToolCommand::from("openscad \"--render");
        let err = command.tokenize(RENDERER).unwrap_err();
        assert!(matches!(err, RenderError::InvalidCommand { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(matches!(
            ToolCommand::from("   ").tokenize(RENDERER),
            Err(RenderError::InvalidCommand { .. })
        ));
        assert!(matches!(
            ToolCommand::Args(Vec::new()).tokenize(RENDERER),
            Err(RenderError::InvalidCommand { .. })
        ));
    }

    #[test]
    fn test_renderer_args_trailing_clause() {
        let args = renderer_args(
            &ToolCommand::from("openscad --render"),
            Path::new("/out/render-abc.scad"),
            Path::new("/out/render-abc.png"),
        )
        .unwrap();
        assert_eq!(
            args,
            strings(&[
                "openscad",
                "--render",
                "-o",
                "/out/render-abc.png",
                "/out/render-abc.scad"
            ])
        );
    }

    #[test]
    fn test_invoke_missing_tool() {
        let tmp = tempfile::TempDir::new().unwrap();
        let command = ToolCommand::from("/nonexistent/bin/scadoc-openscad");

        let err = invoke(
            &ProcessLauncher,
            &command,
            &tmp.path().join("in.scad"),
            &tmp.path().join("out.png"),
            tmp.path(),
        )
        .unwrap_err();

        match err {
            RenderError::ToolMissing { tool, command } => {
                assert_eq!(tool, "openscad");
                assert_eq!(command, "/nonexistent/bin/scadoc-openscad");
            }
            other => panic!("expected ToolMissing, got {other:?}"),
        }
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_invoke_nonzero_exit_captures_stderr() {
        let tmp = tempfile::TempDir::new().unwrap();
        let command = ToolCommand::from(strings(&["sh", "-c", "printf 'ERROR: bad cube' >&2; exit 1"]));

        let err = invoke(
            &ProcessLauncher,
            &command,
            &tmp.path().join("in.scad"),
            &tmp.path().join("out.png"),
            tmp.path(),
        )
        .unwrap_err();

        match err {
            RenderError::ToolError { tool, message } => {
                assert_eq!(tool, "openscad");
                assert_eq!(message, "ERROR: bad cube");
            }
            other => panic!("expected ToolError, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_invoke_runs_in_context_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let context = tmp.path().join("models");
        std::fs::create_dir(&context).unwrap();
        let marker = tmp.path().join("cwd.txt");
        // Positional parameters: $0="-o", $1=output, $2=source
        let command = ToolCommand::from(strings(&["sh", "-c", "pwd -P > \"$1\""]));

        invoke(
            &ProcessLauncher,
            &command,
            &tmp.path().join("in.scad"),
            &marker,
            &context,
        )
        .unwrap();

        let cwd = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(
            Path::new(cwd.trim()),
            context.canonicalize().unwrap().as_path()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_retries_through_shell_on_enoexec() {
        let launcher = FakeLauncher::new(vec![Step::OsError(libc::ENOEXEC), Step::Succeed]);
        let command = ToolCommand::from("epstopdf");
        let args = strings(&["epstopdf", "/out/a.eps"]);

        run_tool(&launcher, "epstopdf", &command, &args, None, true).unwrap();

        let calls = launcher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1].args,
            strings(&["sh", "-c", r#"exec "$0" "$@""#, "epstopdf", "/out/a.eps"])
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_runs_shebangless_script_from_path() {
        use std::os::unix::fs::PermissionsExt;

        let bin = tempfile::TempDir::new().unwrap();
        let work = tempfile::TempDir::new().unwrap();
        let script = bin.path().join("scadoc-test-noshebang");
        std::fs::write(&script, "printf converted > \"$1\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let old_path = std::env::var_os("PATH").unwrap_or_default();
        let mut dirs = vec![bin.path().to_path_buf()];
        dirs.extend(std::env::split_paths(&old_path));
        // SAFETY: only this test resolves the script name; other tests keep their PATH entries
        unsafe {
            std::env::set_var("PATH", std::env::join_paths(dirs).unwrap());
        }

        let target = work.path().join("a.pdf");
        let command = ToolCommand::from("scadoc-test-noshebang");
        let args = strings(&["scadoc-test-noshebang", target.to_str().unwrap()]);
        let result = run_tool(&ProcessLauncher, "epstopdf", &command, &args, None, true);

        unsafe {
            std::env::set_var("PATH", &old_path);
        }
        result.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "converted");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_enoexec_without_fallback_is_fatal() {
        let launcher = FakeLauncher::new(vec![Step::OsError(libc::ENOEXEC)]);
        let command = ToolCommand::from("openscad");

        let err = run_tool(&launcher, RENDERER, &command, &strings(&["openscad"]), None, false)
            .unwrap_err();

        assert!(matches!(err, RenderError::Io(_)));
        assert_eq!(launcher.calls().len(), 1);
    }

    #[test]
    fn test_run_tool_not_found_is_not_retried() {
        let launcher = FakeLauncher::new(vec![Step::NotFound]);
        let command = ToolCommand::from("epstopdf");

        let err = run_tool(&launcher, "epstopdf", &command, &strings(&["epstopdf"]), None, true)
            .unwrap_err();

        assert!(matches!(err, RenderError::ToolMissing { .. }));
        assert_eq!(launcher.calls().len(), 1);
    }

    #[test]
    fn test_run_tool_other_os_error_propagates() {
        let launcher = FakeLauncher::new(vec![Step::PermissionDenied]);
        let command = ToolCommand::from("openscad");

        let err = run_tool(&launcher, RENDERER, &command, &strings(&["openscad"]), None, true)
            .unwrap_err();

        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_display_args_command() {
        let command = ToolCommand::from(strings(&["openscad", "--render"]));
        assert_eq!(command.to_string(), r#"["openscad", "--render"]"#);
    }
}
