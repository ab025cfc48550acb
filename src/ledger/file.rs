//! 追加式日志文件的底层读写
//!
//! - 写入：每条记录一次 `write_all` 整行写入 `O_APPEND` 句柄，随后 `sync_data`
//! - 读取：整文件读取后按行切分，非 UTF-8 字节按替换字符处理，
//!   崩溃留下的半行由上层解析时跳过

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

/// 日志文件错误
#[derive(Debug, Error)]
pub enum LedgerError {
    /// 打开、读取或写入失败
    #[error("日志文件 I/O 失败 {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// key 中包含换行符
    #[error("key 中不能包含换行符: {0:?}")]
    InvalidKey(String),
}

impl LedgerError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// 创建日志文件（已存在时不做任何修改）
pub fn touch(path: &Path) -> Result<(), LedgerError> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o660);
    }
    options.open(path).map_err(|e| LedgerError::io(path, e))?;
    Ok(())
}

/// 追加式日志文件
///
/// 进程内的写锁保证多个并发 `append` 不会交错
#[derive(Debug)]
pub struct AppendLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AppendLog {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一行（自动补换行符）
    ///
    /// 文件必须已存在。末尾残留的半行（崩溃时未写完）先用换行符结束，
    /// 新记录不会被拼接到残行上
    pub fn append(&self, line: &str) -> Result<(), LedgerError> {
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LedgerError::io(&self.path, e))?;

        let needs_separator =
            ends_with_partial_line(&mut file).map_err(|e| LedgerError::io(&self.path, e))?;
        let mut buf = String::with_capacity(line.len() + 2);
        if needs_separator {
            debug!("日志末尾存在残行，补换行符: {:?}", self.path);
            buf.push('\n');
        }
        buf.push_str(line);
        buf.push('\n');

        file.write_all(buf.as_bytes())
            .map_err(|e| LedgerError::io(&self.path, e))?;
        file.sync_data()
            .map_err(|e| LedgerError::io(&self.path, e))?;

        debug!("已追加记录到 {:?}: {}", self.path, line);
        Ok(())
    }

    /// 读取所有非空行
    pub fn read_lines(&self) -> Result<Vec<String>, LedgerError> {
        let bytes = fs::read(&self.path).map_err(|e| LedgerError::io(&self.path, e))?;
        let content = String::from_utf8_lossy(&bytes);
        Ok(content
            .split('\n')
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

/// 文件非空且最后一个字节不是换行符
fn ends_with_partial_line(file: &mut fs::File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.log");
        touch(&path).unwrap();

        let log = AppendLog::new(path);
        log.append("a:1").unwrap();
        log.append("b:2").unwrap();

        assert_eq!(log.read_lines().unwrap(), vec!["a:1", "b:2"]);
    }

    #[test]
    fn test_touch_keeps_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.log");
        touch(&path).unwrap();
        AppendLog::new(path.clone()).append("x:1").unwrap();
        touch(&path).unwrap();

        assert_eq!(AppendLog::new(path).read_lines().unwrap(), vec!["x:1"]);
    }

    #[test]
    fn test_append_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let log = AppendLog::new(temp_dir.path().join("missing.log"));
        assert!(matches!(log.append("a:1"), Err(LedgerError::Io { .. })));
        assert!(matches!(log.read_lines(), Err(LedgerError::Io { .. })));
    }

    #[test]
    fn test_read_skips_empty_lines_and_invalid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.log");
        fs::write(&path, b"a:1\n\n\xffb:2\n").unwrap();

        let lines = AppendLog::new(path).read_lines().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "a:1");
    }

    #[test]
    fn test_append_after_partial_trailing_line() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.log");
        fs::write(&path, "foo:100\nbar:12").unwrap();

        let log = AppendLog::new(path.clone());
        log.append("baz:999").unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "foo:100\nbar:12\nbaz:999\n"
        );
        assert_eq!(log.read_lines().unwrap(), vec!["foo:100", "bar:12", "baz:999"]);
    }
}
