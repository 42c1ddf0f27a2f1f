//! 通知防抖测试
//!
//! 按检测历史验证故障/恢复通知的触发条件

use probe_scheduler::notification::debounce::effective_threshold;
use probe_scheduler::notification::{should_notify_down, should_notify_up};
use probe_scheduler::Check;
use uuid::Uuid;

/// 按从新到旧的顺序构造历史，`true` 表示失败
fn history(outcomes: &[bool]) -> Vec<Check> {
    let service_id = Uuid::new_v4();
    outcomes
        .iter()
        .map(|failed| Check::new(service_id, 0, *failed))
        .collect()
}

/// 依次喂入检测结果，返回每次检测的 (故障通知, 恢复通知) 判定
fn replay(outcomes: &[bool], threshold: u32, continuous: bool) -> Vec<(bool, bool)> {
    let mut past: Vec<Check> = Vec::new();
    let service_id = Uuid::new_v4();
    let window = effective_threshold(threshold) as usize;

    outcomes
        .iter()
        .map(|failed| {
            let recent: Vec<Check> = past.iter().take(window).cloned().collect();
            let decision = if *failed {
                (should_notify_down(&recent, threshold, continuous), false)
            } else {
                (false, should_notify_up(&recent, threshold))
            };
            past.insert(0, Check::new(service_id, 0, *failed));
            decision
        })
        .collect()
}

#[test]
fn test_edge_trigger_fires_exactly_once() {
    assert!(should_notify_down(&history(&[true, true]), 3, false));
    assert!(!should_notify_down(&history(&[true, true, true]), 3, false));
}

#[test]
fn test_continuous_trigger_fires_on_third_and_fourth_failure() {
    assert!(should_notify_down(&history(&[true, true]), 3, true));
    assert!(should_notify_down(&history(&[true, true, true]), 3, true));
}

#[test]
fn test_up_gating() {
    // 最近一次失败且窗口内失败数达到阈值
    assert!(should_notify_up(&history(&[true, true, true]), 3));
    // 最近一次已经成功
    assert!(!should_notify_up(&history(&[false, true, true]), 3));
    // 失败数未达到阈值，从未发过故障通知
    assert!(!should_notify_up(&history(&[true, true, false]), 3));
}

#[test]
fn test_fewer_records_than_threshold() {
    assert!(!should_notify_down(&history(&[]), 3, false));
    assert!(!should_notify_down(&history(&[true]), 3, true));
    assert!(should_notify_down(&history(&[]), 1, false));
    assert!(!should_notify_up(&history(&[]), 1));
    assert!(!should_notify_up(&history(&[true]), 2));
}

#[test]
fn test_zero_threshold_behaves_as_one() {
    assert_eq!(effective_threshold(0), 1);
    assert_eq!(replay(&[true, true, false], 0, false), replay(&[true, true, false], 1, false));
}

#[test]
fn test_outage_produces_one_down_and_one_up() {
    let decisions = replay(&[false, true, true, true, true, false, false], 3, false);
    let downs = decisions.iter().filter(|(down, _)| *down).count();
    let ups = decisions.iter().filter(|(_, up)| *up).count();

    assert_eq!(downs, 1);
    assert_eq!(ups, 1);
    assert!(decisions[3].0);
    assert!(decisions[5].1);
}

#[test]
fn test_flapping_below_threshold_is_silent() {
    let decisions = replay(
        &[true, false, false, true, false, false, true, true, false],
        3,
        false,
    );
    assert!(decisions.iter().all(|(down, up)| !down && !up));
}

#[test]
fn test_continuous_outage_notifies_every_failure_after_threshold() {
    let decisions = replay(&[true, true, true, true, true, false], 2, true);
    let downs: Vec<bool> = decisions.iter().map(|(down, _)| *down).collect();

    assert_eq!(downs, vec![false, true, true, true, true, false]);
    assert!(decisions[5].1);
}
