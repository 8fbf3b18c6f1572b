//! Capture command pipelines
//!
//! Each backend variant is described as one or two [`CommandSpec`]s: an
//! executable name plus an explicit argument vector. Argument lists are
//! built programmatically so nothing is ever interpolated into a shell
//! string.

use super::StartOptions;

/// Capture geometry shared by all backends
pub const CAPTURE_WIDTH: u32 = 640;
pub const CAPTURE_HEIGHT: u32 = 480;
pub const CAPTURE_FPS: u32 = 20;
/// Target bitrate in bits/sec
pub const CAPTURE_BITRATE: u32 = 1_000_000;
/// Keyframe interval in frames (one keyframe per second at 20 fps)
pub const KEYFRAME_INTERVAL: u32 = 20;

/// One pipeline stage: executable plus argument list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name (resolved via PATH) or absolute path
    pub program: String,
    /// Arguments, passed verbatim
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a new command spec
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

// Display is for log lines only; the args are never re-parsed from this
// representation.
impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// libcamera-vid capture stage
///
/// With `hardware_h264` the camera ISP emits encoded H.264 directly;
/// otherwise the stream is handed raw to the transcode stage.
pub fn libcamera_capture(hardware_h264: bool) -> CommandSpec {
    let mut args = vec![
        "-t".to_string(),
        "0".to_string(),
        "--width".to_string(),
        CAPTURE_WIDTH.to_string(),
        "--height".to_string(),
        CAPTURE_HEIGHT.to_string(),
        "--framerate".to_string(),
        CAPTURE_FPS.to_string(),
    ];
    if hardware_h264 {
        args.push("--codec".to_string());
        args.push("h264".to_string());
    }
    args.push("--inline".to_string());
    args.push("--flush".to_string());
    args.push("-o".to_string());
    args.push("-".to_string());

    CommandSpec {
        program: "libcamera-vid".to_string(),
        args,
    }
}

/// ffmpeg stage that remuxes already-encoded H.264 into MPEG-TS
pub fn ffmpeg_remux(opts: StartOptions) -> CommandSpec {
    let mut args: Vec<String> = Vec::new();
    if opts.ultra_low_latency {
        args.extend(flag_pair("-fflags", "nobuffer"));
        args.extend(flag_pair("-flags", "low_delay"));
    }
    args.extend(flag_pair("-i", "-"));
    args.extend(flag_pair("-c:v", "copy"));
    args.extend(flag_pair("-f", "mpegts"));
    args.push("-".to_string());

    CommandSpec {
        program: "ffmpeg".to_string(),
        args,
    }
}

/// ffmpeg stage that transcodes raw capture output with libx264 into MPEG-TS
pub fn ffmpeg_transcode(opts: StartOptions) -> CommandSpec {
    let mut args: Vec<String> = Vec::new();
    if opts.ultra_low_latency {
        args.extend(flag_pair("-fflags", "nobuffer"));
        args.extend(flag_pair("-flags", "low_delay"));
    }
    args.extend(flag_pair("-i", "-"));
    args.extend(flag_pair("-c:v", "libx264"));
    args.extend(flag_pair("-preset", "ultrafast"));
    args.extend(flag_pair("-tune", "zerolatency"));
    args.extend(flag_pair("-profile:v", "baseline"));
    args.extend(flag_pair("-level", "3.0"));
    args.extend(flag_pair("-pix_fmt", "yuv420p"));
    args.extend(flag_pair(
        "-x264opts",
        &format!(
            "keyint={k}:min-keyint={k}:scenecut=0:bframes=0",
            k = KEYFRAME_INTERVAL
        ),
    ));
    args.extend(flag_pair("-bufsize", "64k"));
    args.extend(flag_pair("-maxrate", "1000k"));
    args.extend(flag_pair("-g", &KEYFRAME_INTERVAL.to_string()));
    args.extend(flag_pair("-f", "mpegts"));
    args.push("-".to_string());

    CommandSpec {
        program: "ffmpeg".to_string(),
        args,
    }
}

/// raspivid single-stage capture, raw H.264 on stdout
pub fn raspivid_capture() -> CommandSpec {
    let mut args: Vec<String> = Vec::new();
    args.extend(flag_pair("-t", "0"));
    args.extend(flag_pair("-w", &CAPTURE_WIDTH.to_string()));
    args.extend(flag_pair("-h", &CAPTURE_HEIGHT.to_string()));
    args.extend(flag_pair("-fps", &CAPTURE_FPS.to_string()));
    args.extend(flag_pair("-b", &CAPTURE_BITRATE.to_string()));
    args.extend(flag_pair("-o", "-"));

    CommandSpec {
        program: "raspivid".to_string(),
        args,
    }
}

fn flag_pair(flag: &str, value: &str) -> [String; 2] {
    [flag.to_string(), value.to_string()]
}
