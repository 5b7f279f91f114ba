//! In-process [`Launcher`] for tests.

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::command::{Launcher, ToolOutput};

/// Simulated behavior of one launch.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    /// Copy the source to the `-o` path; for post-processors, write the input
    /// path with a `.pdf` extension.
    WriteOutput,
    /// Write a PNG header with the given size to the `-o` path.
    WritePng(u32, u32),
    /// Write the given text to the `-o` path.
    Write(&'static str),
    /// Exit zero without writing anything.
    Succeed,
    /// Exit non-zero with the given standard error.
    Fail(&'static str),
    /// Program not found.
    NotFound,
    /// Permission denied while launching.
    PermissionDenied,
    /// Launch fails with a raw OS error code.
    #[cfg_attr(not(unix), allow(dead_code))]
    OsError(i32),
}

/// One recorded launch.
#[derive(Debug, Clone)]
pub(crate) struct Launch {
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

/// Launcher that plays back [`Step`]s and records every command line.
///
/// The last step repeats once the queue is exhausted.
pub(crate) struct FakeLauncher {
    steps: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Launch>>,
}

impl FakeLauncher {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Renderer that copies its input to its output.
    pub(crate) fn copying() -> Self {
        Self::new(vec![Step::WriteOutput])
    }

    pub(crate) fn calls(&self) -> Vec<Launch> {
        self.calls.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 {
            steps.pop_front().unwrap()
        } else {
            steps.front().cloned().unwrap_or(Step::Succeed)
        }
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, args: &[String], cwd: Option<&Path>) -> io::Result<ToolOutput> {
        self.calls.lock().unwrap().push(Launch {
            args: args.to_vec(),
            cwd: cwd.map(Path::to_path_buf),
        });

        let ok = ToolOutput {
            success: true,
            stderr: String::new(),
        };
        match self.next_step() {
            Step::WriteOutput => {
                if let Some((output, source)) = output_and_source(args) {
                    std::fs::copy(source, output)?;
                } else if let Some(input) = args.last() {
                    let converted = Path::new(input).with_extension("pdf");
                    std::fs::write(converted, b"%PDF-1.4 converted")?;
                }
                Ok(ok)
            }
            Step::WritePng(width, height) => {
                let (output, _) = output_and_source(args).expect("renderer command line");
                std::fs::write(output, png_header(width, height))?;
                Ok(ok)
            }
            Step::Write(text) => {
                let (output, _) = output_and_source(args).expect("renderer command line");
                std::fs::write(output, text)?;
                Ok(ok)
            }
            Step::Succeed => Ok(ok),
            Step::Fail(stderr) => Ok(ToolOutput {
                success: false,
                stderr: stderr.to_owned(),
            }),
            Step::NotFound => Err(io::Error::from(io::ErrorKind::NotFound)),
            Step::PermissionDenied => Err(io::Error::from(io::ErrorKind::PermissionDenied)),
            Step::OsError(code) => Err(io::Error::from_raw_os_error(code)),
        }
    }
}

fn output_and_source(args: &[String]) -> Option<(&str, &str)> {
    let flag = args.iter().position(|a| a == "-o")?;
    Some((args.get(flag + 1)?, args.get(flag + 2)?))
}

/// Minimal PNG: signature plus the start of an IHDR chunk.
pub(crate) fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(&13u32.to_be_bytes());
    data.extend_from_slice(b"IHDR");
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 6, 0, 0, 0]);
    data
}
