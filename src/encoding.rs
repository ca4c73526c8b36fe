use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, bail, Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfmpegMode {
    Auto,
    System,
    Sidecar,
}

impl FfmpegMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "auto" => Ok(Self::Auto),
            "system" => Ok(Self::System),
            "sidecar" => Ok(Self::Sidecar),
            other => bail!("unknown ffmpeg mode '{other}' (expected auto|system|sidecar)"),
        }
    }
}

/// Encoder settings for one render: canvas geometry plus an optional audio
/// source muxed alongside the piped video frames.
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub audio_url: Option<String>,
}

/// ffmpeg subprocess fed raw RGBA frames over a bounded channel, producing
/// h264/mp4. `finish` joins the writer and reports encoder failure; a failed
/// encode leaves no partial output file behind.
pub struct FfmpegPipe {
    sender: Option<mpsc::SyncSender<Vec<u8>>>,
    worker: Option<JoinHandle<Result<()>>>,
}

trait VideoEncoderBackend: Send {
    fn mode_label(&self) -> &'static str;
    fn run(self: Box<Self>, receiver: mpsc::Receiver<Vec<u8>>) -> Result<()>;
}

struct SystemFfmpegBackend {
    settings: EncodeSettings,
    output_path: PathBuf,
}

#[cfg(feature = "sidecar_ffmpeg")]
struct SidecarFfmpegBackend {
    settings: EncodeSettings,
    output_path: PathBuf,
}

impl FfmpegPipe {
    pub fn spawn(settings: &EncodeSettings, output_path: &Path) -> Result<Self> {
        Self::spawn_with_mode(settings, output_path, FfmpegMode::Auto)
    }

    pub fn spawn_with_mode(
        settings: &EncodeSettings,
        output_path: &Path,
        mode: FfmpegMode,
    ) -> Result<Self> {
        let settings = settings.clone();
        let output_path = output_path.to_path_buf();
        let (sender, receiver) = mpsc::sync_channel::<Vec<u8>>(4);
        let backend = select_backend(mode, settings, output_path)?;
        let worker_name = format!("rrs-ffmpeg-encoder-{}", backend.mode_label());

        let worker = thread::Builder::new()
            .name(worker_name)
            .spawn(move || backend.run(receiver))
            .context("failed to spawn ffmpeg writer thread")?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    pub fn write_frame(&self, rgba_frame: Vec<u8>) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("encoder has already been finalized"))?;
        sender
            .send(rgba_frame)
            .map_err(|_| anyhow!("failed to enqueue frame for ffmpeg"))
    }

    pub fn finish(mut self) -> Result<()> {
        drop(self.sender.take());

        let handle = self
            .worker
            .take()
            .ok_or_else(|| anyhow!("ffmpeg worker thread missing"))?;
        match handle.join() {
            Ok(result) => result,
            Err(_) => Err(anyhow!("ffmpeg worker thread panicked")),
        }
    }
}

fn select_backend(
    mode: FfmpegMode,
    settings: EncodeSettings,
    output_path: PathBuf,
) -> Result<Box<dyn VideoEncoderBackend>> {
    match mode {
        FfmpegMode::Auto | FfmpegMode::System => Ok(Box::new(SystemFfmpegBackend {
            settings,
            output_path,
        })),
        FfmpegMode::Sidecar => {
            #[cfg(feature = "sidecar_ffmpeg")]
            {
                Ok(Box::new(SidecarFfmpegBackend {
                    settings,
                    output_path,
                }))
            }
            #[cfg(not(feature = "sidecar_ffmpeg"))]
            {
                Err(anyhow!(
                    "ffmpeg sidecar mode requested but rrs was built without `sidecar_ffmpeg`. Rebuild with `--features sidecar_ffmpeg`."
                ))
            }
        }
    }
}

impl VideoEncoderBackend for SystemFfmpegBackend {
    fn mode_label(&self) -> &'static str {
        "system"
    }

    fn run(self: Box<Self>, receiver: mpsc::Receiver<Vec<u8>>) -> Result<()> {
        run_ffmpeg_process(
            Path::new("ffmpeg"),
            receiver,
            &self.settings,
            &self.output_path,
            self.mode_label(),
        )
    }
}

#[cfg(feature = "sidecar_ffmpeg")]
impl VideoEncoderBackend for SidecarFfmpegBackend {
    fn mode_label(&self) -> &'static str {
        "sidecar"
    }

    fn run(self: Box<Self>, receiver: mpsc::Receiver<Vec<u8>>) -> Result<()> {
        let path = ffmpeg_sidecar::paths::ffmpeg_path();
        if !path.exists() {
            ffmpeg_sidecar::download::auto_download()
                .context("failed to auto-download ffmpeg sidecar binary")?;
        }
        run_ffmpeg_process(
            &path,
            receiver,
            &self.settings,
            &self.output_path,
            self.mode_label(),
        )
    }
}

fn run_ffmpeg_process(
    ffmpeg_path: &Path,
    receiver: mpsc::Receiver<Vec<u8>>,
    settings: &EncodeSettings,
    output_path: &Path,
    mode_label: &str,
) -> Result<()> {
    let result = drive_ffmpeg(ffmpeg_path, receiver, settings, output_path, mode_label);
    if result.is_err() && output_path.exists() {
        // No partial output may be left in the store on failure.
        let _ = fs::remove_file(output_path);
    }
    result
}

fn drive_ffmpeg(
    ffmpeg_path: &Path,
    receiver: mpsc::Receiver<Vec<u8>>,
    settings: &EncodeSettings,
    output_path: &Path,
    mode_label: &str,
) -> Result<()> {
    let path_str = output_path.to_string_lossy();
    if path_str.len() > 1024 {
        bail!("Output path is suspiciously long");
    }
    if path_str.chars().any(|c| c.is_control()) {
        bail!("Output path contains invalid control characters");
    }

    let args = ffmpeg_args(settings, output_path);
    let mut command = Command::new(ffmpeg_path);
    command
        .args(args.iter().map(String::as_str))
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());
    let mut child = command.spawn().map_err(|error| {
        if error.kind() == ErrorKind::NotFound {
            anyhow!(
                "ffmpeg executable not found (mode={mode_label}, resolved_path={}). Install ffmpeg (system mode) or use sidecar mode with `--features sidecar_ffmpeg`.",
                ffmpeg_path.display()
            )
        } else {
            anyhow!(
                "failed to spawn ffmpeg process (mode={mode_label}, resolved_path={}, args='{}'): {error}",
                ffmpeg_path.display(),
                args.join(" ")
            )
        }
    })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("failed to capture ffmpeg stdin"))?;
    let mut stderr_pipe = child.stderr.take();

    // A write failure (ffmpeg died mid-encode) must still reap the child
    // and surface its stderr; bailing out early would leak a zombie.
    let mut write_error = None;
    while let Ok(frame) = receiver.recv() {
        if let Err(error) = stdin.write_all(&frame) {
            write_error = Some(error);
            break;
        }
    }
    if write_error.is_none() {
        if let Err(error) = stdin.flush() {
            write_error = Some(error);
        }
    }
    drop(stdin);

    let status = child.wait().context("failed waiting for ffmpeg process")?;
    let stderr_tail = read_stderr_tail(&mut stderr_pipe)?;
    if let Some(error) = write_error {
        return Err(anyhow!(
            "failed to write frame to ffmpeg stdin (mode={mode_label}, status={status}, stderr_tail='{stderr_tail}'): {error}"
        ));
    }
    if !status.success() {
        return Err(anyhow!(
            "ffmpeg failed with status {status} (mode={mode_label}, resolved_path={}, args='{}', stderr_tail='{}')",
            ffmpeg_path.display(),
            args.join(" "),
            stderr_tail
        ));
    }

    Ok(())
}

fn ffmpeg_args(settings: &EncodeSettings, output_path: &Path) -> Vec<String> {
    let mut args = ffmpeg_rawvideo_input_args(settings);
    if let Some(audio_url) = &settings.audio_url {
        args.push("-i".to_owned());
        args.push(audio_url.clone());
    }
    args.extend(ffmpeg_h264_output_args(settings.audio_url.is_some()));
    args.push(output_path.to_string_lossy().into_owned());
    args
}

fn ffmpeg_rawvideo_input_args(settings: &EncodeSettings) -> Vec<String> {
    vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-f".to_owned(),
        "rawvideo".to_owned(),
        "-pix_fmt".to_owned(),
        "rgba".to_owned(),
        "-s:v".to_owned(),
        format!("{}x{}", settings.width, settings.height),
        "-r".to_owned(),
        settings.fps.to_string(),
        "-i".to_owned(),
        "-".to_owned(),
    ]
}

fn ffmpeg_h264_output_args(with_audio: bool) -> Vec<String> {
    let mut args = vec![
        "-map".to_owned(),
        "0:v".to_owned(),
        "-c:v".to_owned(),
        "libx264".to_owned(),
        "-pix_fmt".to_owned(),
        "yuv420p".to_owned(),
        "-preset".to_owned(),
        "medium".to_owned(),
        "-crf".to_owned(),
        "18".to_owned(),
        "-movflags".to_owned(),
        "+faststart".to_owned(),
    ];
    if with_audio {
        args.extend([
            "-map".to_owned(),
            "1:a".to_owned(),
            "-c:a".to_owned(),
            "aac".to_owned(),
            "-shortest".to_owned(),
        ]);
    } else {
        args.push("-an".to_owned());
    }
    args
}

fn read_stderr_tail(stderr: &mut Option<std::process::ChildStderr>) -> Result<String> {
    let Some(mut pipe) = stderr.take() else {
        return Ok(String::new());
    };
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf)
        .context("failed reading ffmpeg stderr")?;
    let text = String::from_utf8_lossy(&buf).to_string();
    Ok(last_n_chars(&text, 500))
}

fn last_n_chars(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars().collect::<Vec<_>>();
    if chars.len() > max_chars {
        chars = chars[chars.len().saturating_sub(max_chars)..].to_vec();
    }
    chars.into_iter().collect::<String>().trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::{ffmpeg_args, EncodeSettings, FfmpegMode};
    use std::path::Path;

    fn settings(audio: Option<&str>) -> EncodeSettings {
        EncodeSettings {
            width: 1080,
            height: 1920,
            fps: 30,
            audio_url: audio.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn mode_parses_known_values() {
        assert_eq!(FfmpegMode::parse("auto").unwrap(), FfmpegMode::Auto);
        assert_eq!(FfmpegMode::parse("system").unwrap(), FfmpegMode::System);
        assert_eq!(FfmpegMode::parse("sidecar").unwrap(), FfmpegMode::Sidecar);
        assert!(FfmpegMode::parse("gpu").is_err());
    }

    #[test]
    fn silent_render_disables_audio() {
        let args = ffmpeg_args(&settings(None), Path::new("out.mp4"));
        assert!(args.contains(&"-an".to_owned()));
        assert!(!args.contains(&"aac".to_owned()));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[cfg(unix)]
    #[test]
    fn dead_encoder_is_reaped_and_its_stderr_surfaces() {
        use std::io::Write as _;
        use std::os::unix::fs::PermissionsExt;
        use std::sync::mpsc;

        let dir = tempfile::tempdir().unwrap();
        let stub = dir.path().join("fake-ffmpeg");
        let mut script = std::fs::File::create(&stub).unwrap();
        // Touches its output arg, complains, and dies without reading stdin.
        writeln!(
            script,
            "#!/bin/sh\nfor arg in \"$@\"; do out=\"$arg\"; done\n: > \"$out\"\necho 'stream mangled' >&2\nexit 1"
        )
        .unwrap();
        drop(script);
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755)).unwrap();

        let output = dir.path().join("out.mp4");
        let (sender, receiver) = mpsc::sync_channel::<Vec<u8>>(4);
        for _ in 0..4 {
            sender.send(vec![0_u8; 1 << 20]).unwrap();
        }
        drop(sender);

        let error =
            super::run_ffmpeg_process(&stub, receiver, &settings(None), &output, "system")
                .unwrap_err();
        let message = format!("{error:#}");
        assert!(
            message.contains("stream mangled"),
            "stderr tail missing from: {message}"
        );
        assert!(!output.exists(), "failed encode left partial output behind");
    }

    #[test]
    fn audio_url_becomes_second_input() {
        let args = ffmpeg_args(
            &settings(Some("https://example.com/voice.mp3")),
            Path::new("out.mp4"),
        );
        let audio_input = args
            .iter()
            .position(|arg| arg == "https://example.com/voice.mp3")
            .expect("audio input present");
        assert_eq!(args[audio_input - 1], "-i");
        assert!(args.contains(&"1:a".to_owned()));
        assert!(args.contains(&"-shortest".to_owned()));
    }
}
