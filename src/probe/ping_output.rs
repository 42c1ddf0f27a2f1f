//! ping 输出解析
//!
//! 将 ping 命令的文本输出转换为结构化结果，与进程调用解耦以便独立测试

use regex::Regex;
use std::sync::OnceLock;

/// 单次 ping 的结果分类
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PingOutcome {
    /// 主机名无法解析
    UnknownHost,
    /// 全部丢包
    Unreachable,
    /// 收到回复，往返时间（毫秒）
    RoundTrip(f64),
    /// 输出中找不到往返时间
    Unparseable,
}

impl PingOutcome {
    /// 失败原因，成功时为 `None`
    pub fn failure_reason(&self) -> Option<&'static str> {
        match self {
            PingOutcome::UnknownHost => Some("unknown host"),
            PingOutcome::Unreachable => Some("destination host unreachable"),
            PingOutcome::Unparseable => Some("could not parse ping duration"),
            PingOutcome::RoundTrip(_) => None,
        }
    }

    /// 往返时间截断为整数毫秒
    pub fn latency_ms(&self) -> Option<i64> {
        match self {
            PingOutcome::RoundTrip(ms) => Some(ms.trunc() as i64),
            _ => None,
        }
    }
}

fn round_trip_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"time=(.*) ms").expect("静态正则表达式无效"))
}

/// 解析 ping 命令输出
///
/// 依次匹配 `Unknown host`、`100.0% packet loss` 和 `time=<n> ms`，
/// 文本约定需与现有部署保持逐字一致
///
/// # 参数
/// * `output` - ping 的标准输出与标准错误合并文本
///
/// # 返回
/// * `PingOutcome` - 结果分类
pub fn parse_ping_output(output: &str) -> PingOutcome {
    if output.contains("Unknown host") {
        return PingOutcome::UnknownHost;
    }

    if output.contains("100.0% packet loss") {
        return PingOutcome::Unreachable;
    }

    round_trip_pattern()
        .captures(output)
        .and_then(|captures| captures.get(1))
        .and_then(|value| value.as_str().trim().parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
        .map(PingOutcome::RoundTrip)
        .unwrap_or(PingOutcome::Unparseable)
}
