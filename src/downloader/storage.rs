//! 本地内容文件
//!
//! 对象 key（反转义后）直接映射为数据目录下的嵌套路径，空 key 映射为 `_empty`

use std::io;
use std::path::{Component, Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tracing::warn;

/// 空 key 对应的文件名
pub const EMPTY_KEY_FILE_NAME: &str = "_empty";

/// 计算 key 对应的本地文件路径
///
/// 空段和 `.` 段被忽略；包含 `..` 或根路径的 key 返回 `None`
pub fn content_path(data_dir: &Path, key: &str) -> Option<PathBuf> {
    let mut path = data_dir.to_path_buf();
    let mut pushed = false;

    for segment in key.split('/') {
        for component in Path::new(segment).components() {
            match component {
                Component::Normal(part) => {
                    path.push(part);
                    pushed = true;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
    }

    if !pushed {
        path.push(EMPTY_KEY_FILE_NAME);
    }
    Some(path)
}

/// 以本地文件的实际大小校验续传偏移，返回可用的写入起点
///
/// 文件不存在或大小与偏移不一致时返回 0（从头下载）
pub async fn verify_resume_offset(path: &Path, resume_offset: u64) -> io::Result<u64> {
    if resume_offset == 0 {
        return Ok(0);
    }
    let actual = local_size(path).await?;
    if actual == Some(resume_offset) {
        return Ok(resume_offset);
    }
    warn!(
        "本地文件大小与续传偏移不一致，从头下载: {:?}, 偏移={}, 实际={:?}",
        path, resume_offset, actual
    );
    Ok(0)
}

/// 打开内容文件准备写入
///
/// - `offset == 0`：创建或截断
/// - `offset > 0`：追加（偏移须已由 [`verify_resume_offset`] 校验）
pub async fn open_content_file(path: &Path, offset: u64) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);
        builder.create(parent).await?;
    }

    if offset > 0 {
        OpenOptions::new().append(true).open(path).await
    } else {
        File::create(path).await
    }
}

/// 本地文件大小（不存在时为 `None`）
pub async fn local_size(path: &Path) -> io::Result<Option<u64>> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
