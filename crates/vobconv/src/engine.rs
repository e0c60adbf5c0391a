use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use log::debug;
use crate::config::ConvertConfig;
use crate::error::EngineUnavailable;

/// Handle on the external ffmpeg binary
///
/// Knows how to probe for the binary and how to lay out the argument lists
/// for the two invocations the converter needs: inspection (`ffmpeg -i <file>`,
/// metadata only) and the actual transcode.
#[derive(Debug, Clone)]
pub struct Engine {
    cfg: ConvertConfig,
}

impl Engine {
    pub fn new(cfg: ConvertConfig) -> Self {
        Engine { cfg }
    }

    pub fn config(&self) -> &ConvertConfig {
        &self.cfg
    }

    /// Verify ffmpeg can be started at all
    ///
    /// Runs `ffmpeg -version` with all output discarded. A binary that cannot
    /// be spawned or that exits unsuccessfully is reported as unavailable.
    pub async fn probe(&self) -> Result<(), EngineUnavailable> {
        let bin = &self.cfg.ffmpeg_bin;
        debug!("Probing ffmpeg: {} -version", bin.display());

        let status = Command::new(bin)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| EngineUnavailable {
                bin: bin.clone(),
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(EngineUnavailable {
                bin: bin.clone(),
                reason: format!("`-version` exited with {}", status),
            });
        }

        Ok(())
    }

    /// Command that makes ffmpeg print the container metadata of `input` to stderr
    ///
    /// No output file is given, so ffmpeg exits non-zero after the header dump;
    /// callers only care about the diagnostic text.
    pub fn inspect_command(&self, input: &Path) -> Command {
        let mut cmd = Command::new(&self.cfg.ffmpeg_bin);
        cmd.arg("-i").arg(input).stdin(Stdio::null());
        cmd
    }

    /// Argument list for transcoding `input` into `output`
    pub fn build_transcode_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = Vec::new();

        // Never block on ffmpeg's own overwrite prompt; the caller already decided
        args.push("-y".to_string());

        args.push("-i".to_string());
        args.push(input.to_string_lossy().to_string());

        args.push("-c:v".to_string());
        args.push(self.cfg.video_codec.clone());

        args.push("-c:a".to_string());
        args.push(self.cfg.audio_codec.clone());

        args.push("-strict".to_string());
        args.push(self.cfg.strict.clone());

        args.push(output.to_string_lossy().to_string());

        args
    }

    /// Full program + argument vector for a transcode, including the shell wrapper if configured
    pub fn transcode_argv(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut argv: Vec<String> = self.cfg.shell_wrapper.clone();
        argv.push(self.cfg.ffmpeg_bin.to_string_lossy().to_string());
        argv.extend(self.build_transcode_args(input, output));
        argv
    }

    /// Transcode command with stdin and stderr piped
    ///
    /// stdin stays open so a running transcode can be asked to quit with `q`.
    /// ffmpeg writes its whole diagnostic stream to stderr when the output is
    /// a file, so stdout is discarded and stderr is the only, ordered, source
    /// of progress lines.
    pub fn transcode_command(&self, input: &Path, output: &Path) -> Command {
        let argv = self.transcode_argv(input, output);
        debug!("ffmpeg command: {}", argv.join(" "));

        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Command that kills the whole process tree of a shell-wrapped transcode
    ///
    /// Killing `cmd /c` alone leaves ffmpeg running with the pipes open.
    /// `None` when ffmpeg is started directly or off Windows.
    pub fn tree_kill_command(&self, pid: u32) -> Option<Command> {
        if !cfg!(windows) || self.cfg.shell_wrapper.is_empty() {
            return None;
        }
        let mut cmd = Command::new("taskkill");
        cmd.args(tree_kill_args(pid))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Some(cmd)
    }
}

/// `taskkill` arguments ending `pid` and every process it started
pub fn tree_kill_args(pid: u32) -> Vec<String> {
    vec!["/PID".to_string(), pid.to_string(), "/T".to_string(), "/F".to_string()]
}
