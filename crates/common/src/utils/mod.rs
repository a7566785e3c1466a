/// 工具函数集合

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::{Error, Result};

/// 编排器创建时间格式（精确到分钟，不含时区）
const CREATION_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// 解析编排器资源的创建时间
///
/// 输入形如 `2016-02-04T10:43+0000`，末尾 5 个字符的时区偏移被忽略
pub fn parse_creation_time(value: &str) -> Result<NaiveDateTime> {
    let trimmed = value
        .len()
        .checked_sub(5)
        .and_then(|end| value.get(..end))
        .ok_or_else(|| Error::InvalidArgument(format!("无效的创建时间: {}", value)))?;

    NaiveDateTime::parse_from_str(trimmed, CREATION_TIME_FORMAT)
        .map_err(|e| Error::InvalidArgument(format!("无效的创建时间 {}: {}", value, e)))
}

/// 计算两个时间点之间经过的秒数
pub fn elapsed_secs(now: DateTime<Utc>, since: DateTime<Utc>) -> i64 {
    (now - since).num_seconds()
}
