use chrono::Utc;
use std::path::{Path, PathBuf};

pub const PUBLIC_PREFIX: &str = "/uploads/";

/// 已保存的上传文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub public_url: String,
    pub path: PathBuf,
}

/// 本地磁盘文件存储，对外以 /uploads/<filename> 暴露
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 保存文件，文件名为 `<毫秒时间戳>-<清洗后的原文件名>`
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> std::io::Result<StoredFile> {
        tokio::fs::create_dir_all(&self.root).await?;

        let filename = format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            sanitize_file_name(original_name)
        );
        let path = self.root.join(&filename);
        tokio::fs::write(&path, bytes).await?;

        tracing::debug!("Stored upload {} ({} bytes)", path.display(), bytes.len());
        Ok(StoredFile {
            public_url: format!("{}{}", PUBLIC_PREFIX, filename),
            path,
        })
    }

    /// 公开 URL 转换为磁盘路径；拒绝包含路径分隔符或 `..` 的文件名
    pub fn path_for(&self, public_url: &str) -> Option<PathBuf> {
        let filename = public_url.strip_prefix(PUBLIC_PREFIX).unwrap_or(public_url);
        if !is_plain_file_name(filename) {
            return None;
        }
        Some(self.root.join(filename))
    }

    pub async fn read(&self, filename: &str) -> std::io::Result<Option<Vec<u8>>> {
        let Some(path) = self.path_for(filename) else {
            return Ok(None);
        };
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 删除文件 (失败只记录日志)
    pub async fn remove(&self, public_url: &str) {
        let Some(path) = self.path_for(public_url) else {
            return;
        };
        if let Err(e) = tokio::fs::remove_file(&path).await {
            tracing::warn!("Failed to remove stored file {}: {}", path.display(), e);
        }
    }
}

/// 除 `[A-Za-z0-9.-]` 以外的字符替换为 `_`
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains('/')
        && !name.contains('\\')
}

/// 根据扩展名推断 Content-Type
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
