//! 通知防抖逻辑
//!
//! 纯函数，只读取检测历史。历史按时间从新到旧排列，
//! 均不包含本次尚未写入的检测

use crate::model::Check;

/// 有效的失败阈值，0 按 1 处理
pub fn effective_threshold(threshold: u32) -> u32 {
    threshold.max(1)
}

/// 最近 `threshold` 条历史中失败的数量，记录不足时只统计已有记录
fn failures_in_window(history: &[Check], threshold: u32) -> u32 {
    let failures = history
        .iter()
        .take(threshold as usize)
        .filter(|check| check.is_failure)
        .count();
    u32::try_from(failures).unwrap_or(u32::MAX)
}

/// 本次检测失败时是否发送故障通知
///
/// 连续模式下失败次数达到阈值后每次都通知；边沿模式只在恰好达到阈值时通知一次
///
/// # 参数
/// * `history` - 最近的检测记录，从新到旧
/// * `threshold` - 失败阈值
/// * `continuous` - 是否持续通知
///
/// # 返回
/// * `bool` - 是否通知
pub fn should_notify_down(history: &[Check], threshold: u32, continuous: bool) -> bool {
    let threshold = effective_threshold(threshold);
    let consecutive = failures_in_window(history, threshold).saturating_add(1);

    if continuous {
        consecutive >= threshold
    } else {
        consecutive == threshold
    }
}

/// 本次检测成功时是否发送恢复通知
///
/// 只有上一条检测失败，并且窗口内的失败数已经达到阈值（即曾经发过故障通知）时才通知
///
/// # 参数
/// * `history` - 最近的检测记录，从新到旧
/// * `threshold` - 失败阈值
///
/// # 返回
/// * `bool` - 是否通知
pub fn should_notify_up(history: &[Check], threshold: u32) -> bool {
    let threshold = effective_threshold(threshold);
    let last_failed = history.first().is_some_and(|check| check.is_failure);

    last_failed && failures_in_window(history, threshold) >= threshold
}
