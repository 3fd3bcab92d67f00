//! FFmpeg-based media toolkit implementation.

use async_trait::async_trait;
use rand::RngCore;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::config::MediaConfig;
use super::error::MediaError;
use super::orientation::{scale_pad_filter, target_dimensions};
use super::perturb::PerturbedTargets;
use super::traits::MediaToolkit;
use super::types::{
    MediaMetrics, Orientation, Stage, SynthesizedMedia, TransformProfile, UniquifiedMedia,
};
use crate::metrics::TRANSFORM_STAGE_DURATION;

/// Lines of ffmpeg stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// FFmpeg-based toolkit implementation.
pub struct FfmpegToolkit {
    config: MediaConfig,
}

impl FfmpegToolkit {
    /// Creates a new FFmpeg toolkit with the given configuration.
    pub fn new(config: MediaConfig) -> Self {
        Self { config }
    }

    /// Creates a toolkit with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(MediaConfig::default())
    }

    fn input_args(input: &Path) -> Vec<String> {
        vec![
            "-y".to_string(), // Overwrite output
            "-i".to_string(),
            input.to_string_lossy().to_string(),
        ]
    }

    /// Appends log level, extra args and the output path.
    fn finish_args(&self, mut args: Vec<String>, output: &Path) -> Vec<String> {
        args.extend([
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
        ]);
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());
        args.push(output.to_string_lossy().to_string());
        args
    }

    /// Builds ffmpeg arguments for the metadata scrub (stream copy).
    fn build_scrub_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = Self::input_args(input);
        args.extend(
            [
                "-map_metadata",
                "-1",
                "-map_metadata:s:v",
                "-1",
                "-map_metadata:s:a",
                "-1",
                "-map_chapters",
                "-1",
                "-c",
                "copy",
            ]
            .map(String::from),
        );
        self.finish_args(args, output)
    }

    /// Builds ffmpeg arguments for scale-and-pad to a target frame size.
    fn build_synthesize_args(
        &self,
        input: &Path,
        output: &Path,
        width: u32,
        height: u32,
    ) -> Vec<String> {
        let mut args = Self::input_args(input);
        args.extend([
            "-vf".to_string(),
            scale_pad_filter(width, height),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            self.config.x264_preset.clone(),
            "-crf".to_string(),
            self.config.crf.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "copy".to_string(),
            "-map_metadata".to_string(),
            "-1".to_string(),
        ]);
        self.finish_args(args, output)
    }

    /// Builds ffmpeg arguments for the perturbed re-encode.
    fn build_uniquify_args(
        &self,
        input: &Path,
        output: &Path,
        targets: &PerturbedTargets,
    ) -> Vec<String> {
        let mut filter = "setpts=PTS-STARTPTS".to_string();
        if targets.extend_secs > 0.0 {
            // `-t` only cuts; hold the last frame to reach a longer target.
            filter.push_str(&format!(
                ",tpad=stop_mode=clone:stop_duration={:.3}",
                targets.extend_secs
            ));
        }

        let mut args = Self::input_args(input);
        args.extend([
            "-vf".to_string(),
            filter,
            "-t".to_string(),
            format!("{:.3}", targets.duration_secs),
            "-r".to_string(),
            format!("{:.4}", targets.fps),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            self.config.x264_preset.clone(),
            "-b:v".to_string(),
            targets.bitrate_bps.to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-map_metadata".to_string(),
            "-1".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]);
        self.finish_args(args, output)
    }

    fn build_thumbnail_args(&self, video: &Path, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-ss".to_string(),
            "00:00:00".to_string(),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
        ];
        args.extend(["-map_metadata".to_string(), "-1".to_string()]);
        self.finish_args(args, output)
    }

    /// Parses a rational frame rate like "30000/1001".
    fn parse_frame_rate(rate: &str) -> Option<f64> {
        let fps = match rate.split_once('/') {
            Some((num, den)) => {
                let num = num.trim().parse::<f64>().ok()?;
                let den = den.trim().parse::<f64>().ok()?;
                if den == 0.0 {
                    return None;
                }
                num / den
            }
            None => rate.trim().parse::<f64>().ok()?,
        };
        (fps.is_finite() && fps > 0.0).then_some(fps)
    }

    /// Parses ffprobe JSON output into metrics.
    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaMetrics, MediaError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            #[serde(default)]
            format: Option<ProbeFormat>,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
            avg_frame_rate: Option<String>,
            duration: Option<String>,
        }

        let probe: ProbeOutput = serde_json::from_str(output).map_err(|e| {
            MediaError::unreadable(path, format!("failed to parse ffprobe output: {}", e))
        })?;

        let video = probe
            .streams
            .iter()
            .find(|s| s.codec_type == "video")
            .ok_or_else(|| MediaError::unreadable(path, "no video stream found"))?;

        let width = video.width.unwrap_or(0);
        let height = video.height.unwrap_or(0);
        if width == 0 || height == 0 {
            return Err(MediaError::unreadable(
                path,
                format!("invalid frame size {}x{}", width, height),
            ));
        }

        let fps = video
            .r_frame_rate
            .as_deref()
            .and_then(Self::parse_frame_rate)
            .or_else(|| video.avg_frame_rate.as_deref().and_then(Self::parse_frame_rate))
            .ok_or_else(|| MediaError::unreadable(path, "frame rate unavailable"))?;

        let duration_secs = probe
            .format
            .as_ref()
            .and_then(|f| f.duration.as_deref())
            .or(video.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| MediaError::unreadable(path, "duration unavailable"))?;

        Ok(MediaMetrics {
            duration_secs,
            width,
            height,
            fps,
        })
    }

    /// Runs ffmpeg for one stage, removing `output` if the run does not succeed.
    async fn run_ffmpeg(
        &self,
        stage: Stage,
        args: Vec<String>,
        output: &Path,
    ) -> Result<(), MediaError> {
        let start = Instant::now();
        let result = self.spawn_and_wait(stage, &args).await;

        TRANSFORM_STAGE_DURATION
            .with_label_values(&[stage.as_str()])
            .observe(start.elapsed().as_secs_f64());

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(output).await;
            return Err(e);
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => {
                let _ = tokio::fs::remove_file(output).await;
                Err(MediaError::transform(stage, "output file not created", None))
            }
        }
    }

    async fn spawn_and_wait(&self, stage: Stage, args: &[String]) -> Result<(), MediaError> {
        debug!(stage = %stage, args = ?args, "Running ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MediaError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    MediaError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::transform(stage, "stderr was not captured", None))?;
        let mut reader = BufReader::new(stderr).lines();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            while let Ok(Some(line)) = reader.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, tail))
        })
        .await;

        match result {
            Ok(Ok((status, tail))) => {
                if status.success() {
                    Ok(())
                } else {
                    let stderr = tail.into_iter().collect::<Vec<_>>().join("\n");
                    Err(MediaError::transform(
                        stage,
                        format!("ffmpeg exited with code: {:?}", status.code()),
                        (!stderr.is_empty()).then_some(stderr),
                    ))
                }
            }
            Ok(Err(e)) => Err(MediaError::Io(e)),
            Err(_) => {
                let _ = child.kill().await;
                Err(MediaError::Timeout {
                    stage,
                    timeout_secs: self.config.timeout_secs,
                })
            }
        }
    }

    async fn ensure_input(path: &Path) -> Result<u64, MediaError> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MediaError::InputNotFound {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(MediaError::Io(e)),
        }
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<MediaMetrics, MediaError> {
        Self::ensure_input(path).await?;

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MediaError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    MediaError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(MediaError::unreadable(
                path,
                format!(
                    "ffprobe failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(path, &stdout)
    }

    async fn scrub(&self, input: &Path, output: &Path) -> Result<PathBuf, MediaError> {
        Self::ensure_input(input).await?;
        let args = self.build_scrub_args(input, output);
        self.run_ffmpeg(Stage::Scrub, args, output).await?;
        Ok(output.to_path_buf())
    }

    async fn synthesize(
        &self,
        input: &Path,
        output: &Path,
        orientation: Orientation,
        known: &MediaMetrics,
    ) -> Result<SynthesizedMedia, MediaError> {
        Self::ensure_input(input).await?;
        let (width, height) = target_dimensions(orientation, known.width, known.height);
        let args = self.build_synthesize_args(input, output, width, height);
        self.run_ffmpeg(Stage::Synthesize, args, output).await?;

        Ok(SynthesizedMedia {
            path: output.to_path_buf(),
            metrics: known.with_dimensions(width, height),
        })
    }

    async fn uniquify(
        &self,
        input: &Path,
        output: &Path,
        known: &MediaMetrics,
        rng: &mut (dyn RngCore + Send),
    ) -> Result<UniquifiedMedia, MediaError> {
        let size_bytes = Self::ensure_input(input).await?;
        let profile = TransformProfile::draw(rng);
        let targets = profile.apply(known, size_bytes);
        let args = self.build_uniquify_args(input, output, &targets);
        self.run_ffmpeg(Stage::Uniquify, args, output).await?;

        let metrics = match self.probe(output).await {
            Ok(metrics) => metrics,
            Err(e) => {
                let _ = tokio::fs::remove_file(output).await;
                return Err(MediaError::transform(
                    Stage::Uniquify,
                    format!("output could not be probed: {}", e),
                    None,
                ));
            }
        };
        debug!(
            target_duration = targets.duration_secs,
            duration = metrics.duration_secs,
            "Uniquified output measured"
        );

        Ok(UniquifiedMedia {
            path: output.to_path_buf(),
            metrics,
            profile,
        })
    }

    async fn extract_thumbnail(&self, video: &Path, output: &Path) -> Result<PathBuf, MediaError> {
        Self::ensure_input(video).await?;
        let args = self.build_thumbnail_args(video, output);
        self.run_ffmpeg(Stage::Thumbnail, args, output).await?;
        Ok(output.to_path_buf())
    }

    async fn validate(&self) -> Result<(), MediaError> {
        for (path, is_ffmpeg) in [
            (&self.config.ffmpeg_path, true),
            (&self.config.ffprobe_path, false),
        ] {
            if let Err(e) = Command::new(path).arg("-version").output().await {
                if e.kind() == std::io::ErrorKind::NotFound {
                    return Err(if is_ffmpeg {
                        MediaError::FfmpegNotFound { path: path.clone() }
                    } else {
                        MediaError::FfprobeNotFound { path: path.clone() }
                    });
                }
                return Err(MediaError::Io(e));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(args: &[String], flag: &str) -> usize {
        args.iter().position(|a| a == flag).unwrap()
    }

    #[test]
    fn test_build_scrub_args_strips_metadata_without_reencoding() {
        let toolkit = FfmpegToolkit::with_defaults();
        let args = toolkit.build_scrub_args(Path::new("/in.mp4"), Path::new("/out.mp4"));

        assert!(args.windows(2).any(|w| w[0] == "-map_metadata" && w[1] == "-1"));
        assert!(args.windows(2).any(|w| w[0] == "-map_metadata:s:v" && w[1] == "-1"));
        assert!(args.windows(2).any(|w| w[0] == "-map_metadata:s:a" && w[1] == "-1"));
        assert!(args.windows(2).any(|w| w[0] == "-c" && w[1] == "copy"));
        assert!(!args.contains(&"libx264".to_string()));
        assert_eq!(args.last().unwrap(), "/out.mp4");
    }

    #[test]
    fn test_build_synthesize_args() {
        let toolkit = FfmpegToolkit::with_defaults();
        let args =
            toolkit.build_synthesize_args(Path::new("/in.mp4"), Path::new("/out.mp4"), 608, 1080);

        let vf = &args[position(&args, "-vf") + 1];
        assert!(vf.contains("scale=608:1080"));
        assert!(vf.contains("pad=608:1080"));
        assert_eq!(args[position(&args, "-c:v") + 1], "libx264");
        assert_eq!(args[position(&args, "-crf") + 1], "23");
        assert_eq!(args[position(&args, "-preset") + 1], "medium");
    }

    #[test]
    fn test_build_uniquify_args() {
        let toolkit = FfmpegToolkit::with_defaults();
        let targets = PerturbedTargets {
            duration_secs: 9.95,
            extend_secs: 0.0,
            fps: 30.3,
            bitrate_bps: 7_920_000,
        };
        let args =
            toolkit.build_uniquify_args(Path::new("/in.mp4"), Path::new("/out.mp4"), &targets);

        assert_eq!(args[position(&args, "-t") + 1], "9.950");
        assert_eq!(args[position(&args, "-r") + 1], "30.3000");
        assert_eq!(args[position(&args, "-b:v") + 1], "7920000");
        assert_eq!(args[position(&args, "-vf") + 1], "setpts=PTS-STARTPTS");
    }

    #[test]
    fn test_build_uniquify_args_pads_longer_target() {
        let toolkit = FfmpegToolkit::with_defaults();
        let known = MediaMetrics {
            duration_secs: 10.0,
            width: 1920,
            height: 1080,
            fps: 30.0,
        };
        let profile = TransformProfile {
            duration_delta_secs: 0.08,
            fps_delta_ratio: 0.0,
            bitrate_delta_ratio: 0.0,
        };
        let targets = profile.apply(&known, 10_000_000);
        let args =
            toolkit.build_uniquify_args(Path::new("/in.mp4"), Path::new("/out.mp4"), &targets);

        assert_eq!(args[position(&args, "-t") + 1], "10.080");
        assert_eq!(
            args[position(&args, "-vf") + 1],
            "setpts=PTS-STARTPTS,tpad=stop_mode=clone:stop_duration=0.080"
        );
    }

    #[test]
    fn test_build_thumbnail_args_grabs_one_frame() {
        let toolkit = FfmpegToolkit::with_defaults();
        let args = toolkit.build_thumbnail_args(Path::new("/in.mp4"), Path::new("/thumb.jpg"));
        assert_eq!(args[position(&args, "-frames:v") + 1], "1");
        assert_eq!(args.last().unwrap(), "/thumb.jpg");
    }

    #[test]
    fn test_extra_args_precede_output() {
        let mut config = MediaConfig::default();
        config.extra_ffmpeg_args = vec!["-threads".to_string(), "2".to_string()];
        let toolkit = FfmpegToolkit::new(config);
        let args = toolkit.build_scrub_args(Path::new("/in.mp4"), Path::new("/out.mp4"));
        let n = args.len();
        assert_eq!(&args[n - 3..], &["-threads", "2", "/out.mp4"]);
    }

    #[test]
    fn test_parse_frame_rate() {
        let ntsc = FfmpegToolkit::parse_frame_rate("30000/1001").unwrap();
        assert!((ntsc - 29.97).abs() < 0.01);
        assert_eq!(FfmpegToolkit::parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(FfmpegToolkit::parse_frame_rate("24"), Some(24.0));
        assert_eq!(FfmpegToolkit::parse_frame_rate("0/0"), None);
        assert_eq!(FfmpegToolkit::parse_frame_rate("30/0"), None);
        assert_eq!(FfmpegToolkit::parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_parse_probe_output_video() {
        let json = r#"{
            "format": {
                "filename": "clip.mp4",
                "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                "duration": "12.480000",
                "size": "5000000"
            },
            "streams": [
                {
                    "codec_type": "audio",
                    "codec_name": "aac",
                    "sample_rate": "48000",
                    "channels": 2
                },
                {
                    "codec_type": "video",
                    "codec_name": "h264",
                    "width": 1920,
                    "height": 1080,
                    "r_frame_rate": "30000/1001"
                }
            ]
        }"#;

        let metrics = FfmpegToolkit::parse_probe_output(Path::new("clip.mp4"), json).unwrap();
        assert_eq!(metrics.width, 1920);
        assert_eq!(metrics.height, 1080);
        assert!((metrics.duration_secs - 12.48).abs() < 0.001);
        assert!((metrics.fps - 29.97).abs() < 0.01);
        assert_eq!(metrics.native_orientation(), Orientation::Landscape);
    }

    #[test]
    fn test_parse_probe_output_audio_only_is_unreadable() {
        let json = r#"{
            "format": { "duration": "180.5" },
            "streams": [ { "codec_type": "audio", "codec_name": "flac" } ]
        }"#;

        let err = FfmpegToolkit::parse_probe_output(Path::new("song.flac"), json).unwrap_err();
        assert!(matches!(err, MediaError::UnreadableMedia { .. }));
    }

    #[test]
    fn test_parse_probe_output_falls_back_to_avg_frame_rate() {
        let json = r#"{
            "format": { "duration": "3.0" },
            "streams": [
                {
                    "codec_type": "video",
                    "width": 720,
                    "height": 1280,
                    "r_frame_rate": "0/0",
                    "avg_frame_rate": "24/1"
                }
            ]
        }"#;

        let metrics = FfmpegToolkit::parse_probe_output(Path::new("v.mp4"), json).unwrap();
        assert_eq!(metrics.fps, 24.0);
        assert_eq!(metrics.native_orientation(), Orientation::Portrait);
    }

    #[test]
    fn test_parse_probe_output_rejects_missing_duration() {
        let json = r#"{
            "format": {},
            "streams": [
                { "codec_type": "video", "width": 640, "height": 480, "r_frame_rate": "25/1" }
            ]
        }"#;

        let err = FfmpegToolkit::parse_probe_output(Path::new("v.mp4"), json).unwrap_err();
        assert!(
            matches!(err, MediaError::UnreadableMedia { ref reason, .. } if reason.contains("duration"))
        );
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let toolkit = FfmpegToolkit::with_defaults();
        let err = toolkit
            .probe(Path::new("/nonexistent/clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InputNotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_binary_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.mp4");
        let output = dir.path().join("out.mp4");
        std::fs::write(&input, b"not really a video").unwrap();

        let toolkit = FfmpegToolkit::new(MediaConfig::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
        ));
        let err = toolkit.scrub(&input, &output).await.unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound { .. }));
        assert!(!output.exists());
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_uniquify_reports_measured_output_metrics() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let dir = tempfile::tempdir().unwrap();
        // Writes something to the last argument (the output path).
        let ffmpeg = write_script(
            dir.path(),
            "ffmpeg",
            r#"for arg; do out="$arg"; done; printf 'encoded' > "$out""#,
        );
        let ffprobe = write_script(
            dir.path(),
            "ffprobe",
            r#"echo '{"format":{"duration":"10.040000"},"streams":[{"codec_type":"video","width":1920,"height":1080,"r_frame_rate":"30/1"}]}'"#,
        );
        let input = dir.path().join("in.mp4");
        let output = dir.path().join("out.mp4");
        std::fs::write(&input, vec![0u8; 4096]).unwrap();

        let toolkit = FfmpegToolkit::new(MediaConfig::with_paths(ffmpeg, ffprobe));
        let known = MediaMetrics {
            duration_secs: 10.0,
            width: 1920,
            height: 1080,
            fps: 30.0,
        };
        // A seed whose duration delta lengthens the clip.
        let seed = (0..1000u64)
            .find(|s| {
                TransformProfile::draw(&mut StdRng::seed_from_u64(*s)).duration_delta_secs > 0.05
            })
            .unwrap();
        let mut rng = StdRng::seed_from_u64(seed);

        let result = toolkit
            .uniquify(&input, &output, &known, &mut rng)
            .await
            .unwrap();

        assert!(result.profile.duration_delta_secs > 0.05);
        assert!((result.metrics.duration_secs - 10.04).abs() < 1e-9);
        assert_eq!(result.metrics.fps, 30.0);
        assert!(output.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_thumbnail_failure_names_thumbnail_stage() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = write_script(dir.path(), "ffmpeg", "echo 'Invalid data' >&2; exit 1");
        let ffprobe = write_script(dir.path(), "ffprobe", "exit 1");
        let video = dir.path().join("in.mp4");
        let thumb = dir.path().join("thumb.jpg");
        std::fs::write(&video, vec![0u8; 1024]).unwrap();

        let toolkit = FfmpegToolkit::new(MediaConfig::with_paths(ffmpeg, ffprobe));
        let err = toolkit.extract_thumbnail(&video, &thumb).await.unwrap_err();

        assert!(matches!(
            err,
            MediaError::Transform {
                stage: Stage::Thumbnail,
                ..
            }
        ));
        assert!(err.to_string().starts_with("thumbnail failed"));
        assert!(!thumb.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_uniquify_unprobeable_output_is_removed() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = write_script(
            dir.path(),
            "ffmpeg",
            r#"for arg; do out="$arg"; done; printf 'encoded' > "$out""#,
        );
        let ffprobe = write_script(dir.path(), "ffprobe", "exit 1");
        let input = dir.path().join("in.mp4");
        let output = dir.path().join("out.mp4");
        std::fs::write(&input, vec![0u8; 4096]).unwrap();

        let toolkit = FfmpegToolkit::new(MediaConfig::with_paths(ffmpeg, ffprobe));
        let known = MediaMetrics {
            duration_secs: 10.0,
            width: 1920,
            height: 1080,
            fps: 30.0,
        };
        let err = toolkit
            .uniquify(&input, &output, &known, &mut StdRng::seed_from_u64(3))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MediaError::Transform {
                stage: Stage::Uniquify,
                ..
            }
        ));
        assert!(!output.exists());
    }
}
