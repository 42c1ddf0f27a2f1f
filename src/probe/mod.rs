//! 探测器模块
//!
//! 提供 HTTP 与 ICMP 可达性探测，以及按服务类型选择探测器的注册表

pub mod http;
pub mod icmp;
pub mod ping_output;
pub mod prober;

// 重新导出主要类型
pub use http::{parse_headers, HttpProber};
pub use icmp::{RawIcmpProber, SystemPingProber};
pub use ping_output::{parse_ping_output, PingOutcome};
pub use prober::{ProbeReport, Prober, ProberRegistry};
