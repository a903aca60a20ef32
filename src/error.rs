//! 错误类型定义
//!
//! 提供缓存层操作的错误类型，错误类别与传统文件 I/O 的 errno 一一对应。

use core::fmt;

/// 缓存层操作错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: &'static str,
    os_code: Option<i32>,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// 底层 I/O 错误
    Io,
    /// 无效参数
    InvalidInput,
    /// 句柄无效或未绑定
    BadHandle,
    /// 句柄表已满
    TooManyOpenFiles,
    /// 缓存池分配失败
    OutOfMemory,
}

impl Error {
    /// 创建新错误
    pub const fn new(kind: ErrorKind, message: &'static str) -> Self {
        Self {
            kind,
            message,
            os_code: None,
        }
    }

    /// 获取错误类型
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// 获取错误消息
    pub const fn message(&self) -> &'static str {
        self.message
    }

    /// 底层系统调用返回的原始错误码（如果有）
    pub const fn os_code(&self) -> Option<i32> {
        self.os_code
    }

    /// 转换为 errno 值
    ///
    /// 底层 I/O 错误保持原始错误码不变，其余类别映射为对应的 errno。
    pub fn errno(&self) -> i32 {
        match self.kind {
            ErrorKind::Io => self.os_code.unwrap_or(libc::EIO),
            ErrorKind::InvalidInput => libc::EINVAL,
            ErrorKind::BadHandle => libc::EBADF,
            ErrorKind::TooManyOpenFiles => libc::EMFILE,
            ErrorKind::OutOfMemory => libc::ENOMEM,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(code) = self.os_code {
            write!(f, " (os error {})", code)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::InvalidInput => ErrorKind::InvalidInput,
            std::io::ErrorKind::OutOfMemory => ErrorKind::OutOfMemory,
            _ => ErrorKind::Io,
        };
        Self {
            kind,
            message: "underlying storage operation failed",
            os_code: err.raw_os_error(),
        }
    }
}

/// Result 类型别名
pub type Result<T> = core::result::Result<T, Error>;
