//! ICMP探测器实现
//!
//! 两种实现产生相同的三类结果（未知主机、全部丢包、往返时间）：
//! - `SystemPingProber` 调用系统 ping 命令并解析文本输出
//! - `RawIcmpProber` 直接通过原始套接字发送 ICMP echo（需要相应权限）

use crate::error::ProbeError;
use crate::model::Service;
use crate::probe::ping_output::{parse_ping_output, PingOutcome};
use crate::probe::prober::{ProbeReport, Prober};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, ICMP};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};
use uuid::Uuid;

/// 子进程超出 ping 自身超时后的额外等待时间
const PROCESS_GRACE: Duration = Duration::from_secs(2);

/// ICMP echo 负载
const ECHO_PAYLOAD: [u8; 56] = [0; 56];

/// 将结果分类转换为探测结果
fn report_from_outcome(service_id: Uuid, outcome: PingOutcome) -> ProbeReport {
    match (outcome.latency_ms(), outcome.failure_reason()) {
        (Some(latency), _) => ProbeReport::success(service_id, latency),
        (None, Some(reason)) => ProbeReport::failure(service_id, reason),
        (None, None) => ProbeReport::failure(service_id, "could not parse ping duration"),
    }
}

/// 服务的请求超时（毫秒）
fn timeout_millis(service: &Service) -> u64 {
    u64::try_from(service.request_timeout_seconds.max(1)).unwrap_or(1) * 1000
}

/// 调用系统 ping 命令的探测器
#[derive(Debug, Clone)]
pub struct SystemPingProber {
    /// ping 可执行文件
    program: String,
}

impl Default for SystemPingProber {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemPingProber {
    /// 使用 PATH 中的 `ping`
    pub fn new() -> Self {
        Self::with_program("ping")
    }

    /// 使用指定的 ping 可执行文件
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Prober for SystemPingProber {
    async fn probe(&self, service: &Service) -> Result<ProbeReport, ProbeError> {
        let timeout_ms = timeout_millis(service);

        let mut command = Command::new(&self.program);
        command
            .arg(&service.endpoint)
            .args(["-c", "1", "-W", &timeout_ms.to_string()])
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let deadline = Duration::from_millis(timeout_ms) + PROCESS_GRACE;
        let output = match timeout(deadline, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                return Err(ProbeError::PingUnavailable(format!(
                    "找不到可执行文件 {}",
                    self.program
                )));
            }
            Ok(Err(e)) => return Err(ProbeError::PingUnavailable(e.to_string())),
            Err(_) => {
                warn!("ping {} 超过 {:?} 未结束", service.endpoint, deadline);
                return Ok(report_from_outcome(service.id, PingOutcome::Unreachable));
            }
        };

        if !output.status.success() {
            debug!("ping {} 退出状态: {}", service.endpoint, output.status);
        }

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(report_from_outcome(service.id, parse_ping_output(&text)))
    }
}

/// 通过原始 ICMP 套接字探测
#[derive(Debug, Clone, Default)]
pub struct RawIcmpProber;

impl RawIcmpProber {
    /// 创建新的原始 ICMP 探测器
    pub fn new() -> Self {
        Self
    }

    /// 解析主机地址，无法解析时返回 `None`
    async fn resolve(host: &str) -> Option<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(ip);
        }

        match tokio::net::lookup_host((host, 0)).await {
            Ok(mut addrs) => addrs.next().map(|addr| addr.ip()),
            Err(e) => {
                debug!("解析主机 {} 失败: {}", host, e);
                None
            }
        }
    }
}

#[async_trait]
impl Prober for RawIcmpProber {
    async fn probe(&self, service: &Service) -> Result<ProbeReport, ProbeError> {
        let Some(target) = Self::resolve(&service.endpoint).await else {
            return Ok(report_from_outcome(service.id, PingOutcome::UnknownHost));
        };

        let config = match target {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };
        let client =
            Client::new(&config).map_err(|e| ProbeError::IcmpUnavailable(e.to_string()))?;

        let mut pinger = client.pinger(target, PingIdentifier(rand::random())).await;
        pinger.timeout(Duration::from_millis(timeout_millis(service)));

        let outcome = match pinger.ping(PingSequence(0), &ECHO_PAYLOAD).await {
            Ok((_packet, rtt)) => PingOutcome::RoundTrip(rtt.as_secs_f64() * 1000.0),
            Err(e) => {
                debug!("ICMP echo {} 失败: {}", target, e);
                PingOutcome::Unreachable
            }
        };

        Ok(report_from_outcome(service.id, outcome))
    }
}
