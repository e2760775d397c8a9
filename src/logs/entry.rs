//! 日志条目数据结构
//!
//! 定义控制台日志条目及其级别

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::str::FromStr;

/// 日志级别枚举
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// 跟踪级别
    Trace,
    /// 调试级别
    Debug,
    /// 信息级别
    #[default]
    Info,
    /// 警告级别
    Warn,
    /// 错误级别
    Error,
}

impl LogLevel {
    /// 小写名称，与序列化结果一致
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("未知的日志级别: {other}")),
        }
    }
}

/// 控制台日志条目，创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// 记录时间
    #[serde(serialize_with = "serialize_ts")]
    pub ts: DateTime<Utc>,
    /// 日志级别
    pub level: LogLevel,
    /// 日志内容
    pub msg: String,
}

impl LogEntry {
    /// 以当前时间创建日志条目
    pub fn new(level: LogLevel, msg: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            level,
            msg: msg.into(),
        }
    }

    /// 单行可读格式：`[ts] [LEVEL] msg`
    pub fn to_line(&self) -> String {
        format!(
            "[{}] [{}] {}",
            self.ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.level.as_str().to_uppercase(),
            self.msg
        )
    }
}

// 浏览器端按 ISO-8601 毫秒精度解析
fn serialize_ts<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing_is_case_insensitive() {
        assert_eq!("ERROR".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!("Warn".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("warning".parse::<LogLevel>().is_err());
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = LogEntry::new(LogLevel::Warn, "Non-200 status: 503");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["level"], "warn");
        assert_eq!(json["msg"], "Non-200 status: 503");
        let ts = json["ts"].as_str().unwrap();
        assert!(ts.ends_with('Z'));
        assert!(ts.contains('.'));
    }

    #[test]
    fn test_to_line_format() {
        let entry = LogEntry::new(LogLevel::Info, "hello");
        let line = entry.to_line();
        assert!(line.contains("[INFO] hello"));
        assert!(line.starts_with('['));
    }
}
