//! Tesseract OCR backend.
//!
//! Drives the `tesseract` command-line binary. The decoded image is written
//! to a temporary PNG, tesseract writes its text next to it, and the child is
//! killed if it outlives the configured deadline.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use image::ImageFormat;
use tempfile::TempDir;

use crate::backend::{BackendError, OcrBackend};
use crate::decode::DecodedImage;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How tesseract is invoked.
#[derive(Debug, Clone)]
pub struct TesseractOptions {
    /// Binary name or path.
    pub binary: PathBuf,
    /// Language pack(s), e.g. `eng` or `eng+jpn`.
    pub language: String,
    /// `--psm` value; tesseract's own default when unset.
    pub page_segmentation_mode: Option<u8>,
    pub timeout: Option<Duration>,
}

impl Default for TesseractOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            page_segmentation_mode: None,
            timeout: None,
        }
    }
}

pub struct TesseractBackend {
    options: TesseractOptions,
}

impl TesseractBackend {
    pub fn new() -> Self {
        Self::with_options(TesseractOptions::default())
    }

    pub fn with_options(options: TesseractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TesseractOptions {
        &self.options
    }

    /// Run tesseract on an image file and return its text output.
    fn run_tesseract(&self, image_path: &Path, work_dir: &Path) -> Result<String, BackendError> {
        let output_base = work_dir.join("out");
        let stderr_path = work_dir.join("stderr.log");

        let mut cmd = Command::new(&self.options.binary);
        cmd.arg(image_path)
            .arg(&output_base)
            .args(["-l", &self.options.language]);
        if let Some(psm) = self.options.page_segmentation_mode {
            cmd.args(["--psm", &psm.to_string()]);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(File::create(&stderr_path)?));

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackendError::NotAvailable(format!(
                    "{} not found (install tesseract-ocr)",
                    self.options.binary.display()
                )));
            }
            Err(e) => return Err(BackendError::Io(e)),
        };

        let status = wait_with_deadline(child, self.options.timeout)?;
        if !status.success() {
            let stderr = std::fs::read(&stderr_path).unwrap_or_default();
            return Err(BackendError::Failed(format!(
                "tesseract exited with {}: {}",
                status,
                String::from_utf8_lossy(&stderr).trim()
            )));
        }

        let text = std::fs::read(output_base.with_extension("txt"))?;
        Ok(String::from_utf8_lossy(&text).into_owned())
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        Command::new(&self.options.binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn recognize(&self, image: &DecodedImage) -> Result<String, BackendError> {
        let work_dir = TempDir::new()?;
        let image_path = work_dir.path().join("input.png");
        image.image.save_with_format(&image_path, ImageFormat::Png)?;
        self.run_tesseract(&image_path, work_dir.path())
    }
}

/// Wait for `child`, killing it once `timeout` has elapsed.
fn wait_with_deadline(
    mut child: Child,
    timeout: Option<Duration>,
) -> Result<ExitStatus, BackendError> {
    let Some(timeout) = timeout else {
        return Ok(child.wait()?);
    };

    // A deadline past the end of the clock means no deadline at all.
    let Some(deadline) = Instant::now().checked_add(timeout) else {
        return Ok(child.wait()?);
    };
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BackendError::TimedOut(timeout));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Mutex;

    use image::{DynamicImage, ImageBuffer, Luma};

    // Writing an executable while another test thread forks can fail with
    // ETXTBSY, so stand-in scripts are created and run one at a time.
    static SCRIPT_LOCK: Mutex<()> = Mutex::new(());

    fn stand_in(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-tesseract");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn backend(binary: PathBuf, timeout: Option<Duration>) -> TesseractBackend {
        TesseractBackend::with_options(TesseractOptions {
            binary,
            page_segmentation_mode: Some(6),
            timeout,
            ..TesseractOptions::default()
        })
    }

    fn blank() -> DecodedImage {
        DecodedImage {
            image: DynamicImage::ImageLuma8(ImageBuffer::from_pixel(8, 8, Luma([255u8]))),
            format: ImageFormat::Png,
        }
    }

    #[test]
    fn reads_text_written_by_tesseract() {
        let _guard = SCRIPT_LOCK.lock().unwrap();
        let dir = TempDir::new().unwrap();
        // $1 = image, $2 = output base, then -l eng --psm 6
        let bin = stand_in(
            dir.path(),
            r#"[ -f "$1" ] || exit 3
[ "$4" = "eng" ] || exit 4
[ "$6" = "6" ] || exit 5
printf 'HELLO\n' > "$2.txt""#,
        );
        let text = backend(bin, None).recognize(&blank()).unwrap();
        assert_eq!(text, "HELLO\n");
    }

    #[test]
    fn non_utf8_output_is_replaced_not_rejected() {
        let _guard = SCRIPT_LOCK.lock().unwrap();
        let dir = TempDir::new().unwrap();
        let bin = stand_in(dir.path(), r#"printf 'caf\351 \344\270\255' > "$2.txt""#);
        let text = backend(bin, None).recognize(&blank()).unwrap();
        assert!(text.starts_with("caf"));
        assert!(text.ends_with('中'));
    }

    #[test]
    fn failing_binary_reports_stderr() {
        let _guard = SCRIPT_LOCK.lock().unwrap();
        let dir = TempDir::new().unwrap();
        let bin = stand_in(
            dir.path(),
            "echo 'Failed loading language xyz' >&2\nexit 1",
        );
        let err = backend(bin, None).recognize(&blank()).unwrap_err();
        match err {
            BackendError::Failed(msg) => assert!(msg.contains("Failed loading language xyz")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn hung_binary_is_killed() {
        let _guard = SCRIPT_LOCK.lock().unwrap();
        let dir = TempDir::new().unwrap();
        let bin = stand_in(dir.path(), "exec sleep 10");
        let start = Instant::now();
        let err = backend(bin, Some(Duration::from_millis(100)))
            .recognize(&blank())
            .unwrap_err();
        assert!(matches!(err, BackendError::TimedOut(_)));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn unbounded_timeout_waits_normally() {
        let _guard = SCRIPT_LOCK.lock().unwrap();
        let dir = TempDir::new().unwrap();
        let bin = stand_in(dir.path(), r#"printf 'ok' > "$2.txt""#);
        let text = backend(bin, Some(Duration::from_secs(u64::MAX)))
            .recognize(&blank())
            .unwrap();
        assert_eq!(text, "ok");
    }

    #[test]
    fn missing_binary_is_not_available() {
        let _guard = SCRIPT_LOCK.lock().unwrap();
        let b = backend(PathBuf::from("/nonexistent/tesseract"), None);
        assert!(!b.is_available());
        let err = b.recognize(&blank()).unwrap_err();
        assert!(matches!(err, BackendError::NotAvailable(_)));
    }
}
