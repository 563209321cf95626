use std::io::Write;

/// Where a command sends what it has to say, and how it ends the process.
///
/// Command summaries like `Synced ...` go to [`output`](Host::output); clap usage
/// errors go to [`error`](Host::error). Logs and the progress bar bypass the host
/// and write to stderr directly.
pub trait Host: Send + Sync {
    fn output(&mut self) -> impl Write;

    fn error(&mut self) -> impl Write;

    /// End the process with `code`. Test hosts record it and return.
    fn exit(&mut self, code: i32);
}

/// Records everything a command writes.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct TestHost {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: Option<i32>,
}

#[cfg(test)]
impl TestHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

#[cfg(test)]
impl Host for TestHost {
    fn output(&mut self) -> impl Write {
        &mut self.stdout
    }

    fn error(&mut self) -> impl Write {
        &mut self.stderr
    }

    fn exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }
}
