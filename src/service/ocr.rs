use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use crate::config::OcrConfig;
use crate::error::OcrError;
use crate::models::ExtractedInvoiceData;
use crate::service::extractor;

/// OCR 引擎接口：输入文件路径，返回识别出的原始文本
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn recognize(&self, path: &Path) -> Result<String, OcrError>;
}

/// 调用本地 tesseract 命令行
#[derive(Debug, Clone)]
pub struct TesseractCli {
    binary: String,
    language: String,
}

impl TesseractCli {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            language: config.language.clone(),
        }
    }
}

impl OcrEngine for TesseractCli {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&self, path: &Path) -> Result<String, OcrError> {
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            return Err(OcrError::UnsupportedFormat("application/pdf".to_string()));
        }

        let output = Command::new(&self.binary)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// 识别文件并提取字段；OCR 失败时返回置信度为 0 的空结果，不中断上传
pub async fn recognize_and_extract(
    engine: Arc<dyn OcrEngine>,
    path: PathBuf,
) -> ExtractedInvoiceData {
    let engine_name = engine.name();
    let display_path = path.display().to_string();

    let result = tokio::task::spawn_blocking(move || engine.recognize(&path))
        .await
        .map_err(|e| OcrError::Join(e.to_string()))
        .and_then(|r| r);

    match result {
        Ok(text) => {
            tracing::info!(
                "{} recognized {} chars from {}",
                engine_name,
                text.len(),
                display_path
            );
            extractor::extract(&text)
        }
        Err(e) => {
            tracing::warn!("OCR processing error for {}: {}", display_path, e);
            ExtractedInvoiceData::ocr_failed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Currency;

    struct FixedText(&'static str);

    impl OcrEngine for FixedText {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn recognize(&self, _path: &Path) -> Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    struct Broken;

    impl OcrEngine for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn recognize(&self, _path: &Path) -> Result<String, OcrError> {
            Err(OcrError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "cannot read image".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_successful_recognition_runs_extractor() {
        let data = recognize_and_extract(
            Arc::new(FixedText("Acme Corp\nTotal: $5.00")),
            PathBuf::from("scan.png"),
        )
        .await;

        assert_eq!(data.vendor.as_deref(), Some("Acme Corp"));
        assert_eq!(data.currency, Some(Currency::Usd));
        assert_eq!(data.confidence, 0.7);
    }

    #[tokio::test]
    async fn test_failed_recognition_degrades_to_zero_confidence() {
        let data = recognize_and_extract(Arc::new(Broken), PathBuf::from("scan.png")).await;
        assert_eq!(data, ExtractedInvoiceData::ocr_failed());
    }

    #[test]
    fn test_tesseract_rejects_pdf_without_spawning() {
        let engine = TesseractCli::new(&OcrConfig {
            binary: "/nonexistent/tesseract".to_string(),
            language: "eng".to_string(),
        });
        let err = engine.recognize(Path::new("/tmp/invoice.PDF")).unwrap_err();
        assert!(matches!(err, OcrError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_tesseract_missing_binary_is_spawn_error() {
        let engine = TesseractCli::new(&OcrConfig {
            binary: "/nonexistent/tesseract".to_string(),
            language: "eng".to_string(),
        });
        let err = engine.recognize(Path::new("/tmp/invoice.png")).unwrap_err();
        assert!(matches!(err, OcrError::Spawn(_)));
    }
}
