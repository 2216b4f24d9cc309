use crate::config::OcrConfig;
use crate::ocr::{decode_image, OcrEngine, OcrError};
use async_trait::async_trait;
use image::ImageFormat;
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// OCR through the `tesseract` command line tool
///
/// Images are decoded first, so undecodable downloads fail with
/// [`OcrError::Decode`] without starting a process, then re-encoded as PNG
/// and piped through `tesseract stdin stdout -l <language>`.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    program: PathBuf,
    language: String,
    timeout: Duration,
}

impl TesseractEngine {
    pub fn new(program: impl Into<PathBuf>, language: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
            timeout,
        }
    }

    pub fn from_config(config: &OcrConfig) -> Self {
        Self::new(
            config.tesseract_path.clone(),
            config.language.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    async fn recognize_text(&self, image: &[u8]) -> Result<String, OcrError> {
        let decoded = decode_image(image)?;
        let mut png = Vec::new();
        decoded
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| OcrError::Engine(format!("PNG encoding failed: {}", e)))?;

        let mut child = Command::new(&self.program)
            .args(["stdin", "stdout", "-l"])
            .arg(&self.language)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| OcrError::Engine("tesseract stdin unavailable".to_string()))?;

        let run = async move {
            stdin.write_all(&png).await?;
            drop(stdin);
            child.wait_with_output().await
        };

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| OcrError::Engine(format!("tesseract timed out after {:?}", self.timeout)))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
