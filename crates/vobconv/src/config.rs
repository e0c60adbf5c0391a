use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the VOB conversion batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Path to the ffmpeg binary (looked up on PATH when bare)
    pub ffmpeg_bin: PathBuf,
    /// Extension of the source files to convert, without the dot
    pub source_extension: String,
    /// Match the source extension regardless of ASCII case
    pub ignore_extension_case: bool,
    /// Extension of the output container, without the dot
    pub target_extension: String,
    /// Video codec passed to `-c:v`
    pub video_codec: String,
    /// Audio codec passed to `-c:a`
    pub audio_codec: String,
    /// Value passed to `-strict`
    pub strict: String,
    /// Command prefix used to launch the transcode (e.g. `cmd /c` on Windows)
    pub shell_wrapper: Vec<String>,
    /// Follow symlinks while walking the source tree
    pub follow_links: bool,
    /// Seconds to wait for ffmpeg to quit after a termination request before killing it
    pub terminate_grace_secs: u64,
    /// Optional watchdog: terminate a single transcode after this many seconds
    pub job_timeout_secs: Option<u64>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ConvertConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            source_extension: "VOB".to_string(),
            ignore_extension_case: false,
            target_extension: "mp4".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            strict: "experimental".to_string(),
            shell_wrapper: default_shell_wrapper(),
            follow_links: false,
            terminate_grace_secs: 5,
            job_timeout_secs: None,
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // TOML by extension, JSON otherwise
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            }
        }

        Ok(config)
    }

    /// Check whether a path carries the configured source extension
    pub fn is_source_path(&self, path: &Path) -> bool {
        match path.extension().and_then(|s| s.to_str()) {
            Some(ext) if self.ignore_extension_case => ext.eq_ignore_ascii_case(&self.source_extension),
            Some(ext) => ext == self.source_extension,
            None => false,
        }
    }

    /// Output path for a source: same directory, extension swapped for the target container
    pub fn output_path_for(&self, source: &Path) -> PathBuf {
        source.with_extension(&self.target_extension)
    }
}

fn default_shell_wrapper() -> Vec<String> {
    if cfg!(windows) {
        vec!["cmd".to_string(), "/c".to_string()]
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_source_extension_is_case_sensitive_by_default() {
        let cfg = ConvertConfig::default();
        assert!(cfg.is_source_path(Path::new("/dvd/VIDEO_TS/VTS_01_1.VOB")));
        assert!(!cfg.is_source_path(Path::new("/dvd/VIDEO_TS/VTS_01_1.vob")));
        assert!(!cfg.is_source_path(Path::new("/dvd/VIDEO_TS/VIDEO_TS.IFO")));
        assert!(!cfg.is_source_path(Path::new("/dvd/VIDEO_TS/VOB")));
    }

    #[test]
    fn test_ignore_extension_case() {
        let cfg = ConvertConfig {
            ignore_extension_case: true,
            ..Default::default()
        };
        assert!(cfg.is_source_path(Path::new("movie.vob")));
        assert!(cfg.is_source_path(Path::new("movie.Vob")));
    }

    #[test]
    fn test_output_path_replaces_extension() {
        let cfg = ConvertConfig::default();
        assert_eq!(
            cfg.output_path_for(Path::new("/dvd/VIDEO_TS/VTS_01_1.VOB")),
            PathBuf::from("/dvd/VIDEO_TS/VTS_01_1.mp4")
        );
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let cfg = ConvertConfig::load_config(Some(Path::new("/nonexistent/vob2mp4.toml"))).unwrap();
        assert_eq!(cfg.source_extension, "VOB");
        assert_eq!(cfg.terminate_grace_secs, 5);
    }

    #[test]
    fn test_load_partial_toml_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "video_codec = \"libx265\"\njob_timeout_secs = 3600").unwrap();

        let cfg = ConvertConfig::load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.video_codec, "libx265");
        assert_eq!(cfg.job_timeout_secs, Some(3600));
        assert_eq!(cfg.audio_codec, "aac");
    }

    #[test]
    fn test_load_json() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"source_extension": "vob", "ignore_extension_case": true}}"#).unwrap();

        let cfg = ConvertConfig::load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.source_extension, "vob");
        assert!(cfg.ignore_extension_case);
    }

    #[test]
    fn test_load_invalid_toml_errors() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "video_codec = ").unwrap();
        assert!(ConvertConfig::load_config(Some(file.path())).is_err());
    }
}
