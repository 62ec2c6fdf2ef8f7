//! Command-line interface.

use std::path::PathBuf;
use std::process;

use clap::error::ErrorKind;
use clap::Parser;

use crate::surface::ScaleMode;

/// Clock-slaved looping video player. The picture follows an external JACK
/// transport frame-accurately, including loops and scrubs.
#[derive(Debug, Parser)]
#[command(name = "framelock", version)]
pub struct Cli {
    /// Path to the video file to play
    pub video_file: PathBuf,

    /// Sync offset in milliseconds; positive delays the video relative to
    /// the transport, negative advances it
    #[arg(short = 'o', long = "offset", default_value_t = 0.0, allow_negative_numbers = true)]
    pub offset: f64,

    /// Borderless fullscreen on the primary display
    #[arg(short = 'f', long = "fullscreen")]
    pub fullscreen: bool,

    /// Aspect policy used to fit the video into the window
    #[arg(short = 's', long = "scale", value_enum, default_value_t = ScaleMode::Letterbox)]
    pub scale: ScaleMode,
}

/// Parses the command line; help/version exit 0, anything invalid exits 1
/// with a one-line diagnostic, matching the player's startup-failure code.
pub fn parse() -> Cli {
    match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            print!("{err}");
            process::exit(0);
        }
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}

/// Runtime settings the interactive keys mutate.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub video_file: PathBuf,
    pub offset_ms: f64,
    pub fullscreen: bool,
    pub scale: ScaleMode,
}

impl RuntimeSettings {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            video_file: cli.video_file.clone(),
            offset_ms: cli.offset,
            fullscreen: cli.fullscreen,
            scale: cli.scale,
        }
    }

    /// A command line that reproduces the current settings, omitting
    /// arguments at their defaults.
    pub fn reproduce_command(&self) -> String {
        let mut cmd = format!("framelock {}", self.video_file.display());
        if self.offset_ms != 0.0 {
            cmd.push_str(&format!(" --offset {:.1}", self.offset_ms));
        }
        if self.fullscreen {
            cmd.push_str(" --fullscreen");
        }
        if self.scale != ScaleMode::Letterbox {
            cmd.push_str(&format!(" --scale {}", self.scale.as_str()));
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["framelock", "clip.mp4"]).unwrap();
        assert_eq!(cli.video_file, PathBuf::from("clip.mp4"));
        assert_eq!(cli.offset, 0.0);
        assert!(!cli.fullscreen);
        assert_eq!(cli.scale, ScaleMode::Letterbox);
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "framelock",
            "clip.mp4",
            "--offset",
            "-12.5",
            "--fullscreen",
            "--scale",
            "crop",
        ])
        .unwrap();
        assert_eq!(cli.offset, -12.5);
        assert!(cli.fullscreen);
        assert_eq!(cli.scale, ScaleMode::Crop);
    }

    #[test]
    fn test_short_flags() {
        let cli =
            Cli::try_parse_from(["framelock", "clip.mp4", "-o", "5", "-f", "-s", "stretch"])
                .unwrap();
        assert_eq!(cli.offset, 5.0);
        assert!(cli.fullscreen);
        assert_eq!(cli.scale, ScaleMode::Stretch);
    }

    #[test]
    fn test_unknown_scale_mode_is_rejected() {
        assert!(Cli::try_parse_from(["framelock", "clip.mp4", "--scale", "zoom"]).is_err());
    }

    #[test]
    fn test_missing_video_file_is_rejected() {
        assert!(Cli::try_parse_from(["framelock"]).is_err());
    }

    #[test]
    fn test_reproduce_command_omits_defaults() {
        let settings = RuntimeSettings {
            video_file: PathBuf::from("clip.mp4"),
            offset_ms: 0.0,
            fullscreen: false,
            scale: ScaleMode::Letterbox,
        };
        assert_eq!(settings.reproduce_command(), "framelock clip.mp4");
    }

    #[test]
    fn test_reproduce_command_reflects_runtime_state() {
        let settings = RuntimeSettings {
            video_file: PathBuf::from("clip.mp4"),
            offset_ms: -12.0,
            fullscreen: true,
            scale: ScaleMode::Crop,
        };
        assert_eq!(
            settings.reproduce_command(),
            "framelock clip.mp4 --offset -12.0 --fullscreen --scale crop"
        );
    }
}
