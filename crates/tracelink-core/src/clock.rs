//! 追踪记录使用的单调时间戳。
//!
//! 计数单位为 0.1 微秒，纪元为进程内首次取时的时刻；数值仅用于比较先后，
//! 不表示墙上时间。

use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// 每秒对应的计数值。
pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// 每个计数对应的纳秒数。
pub const NANOS_PER_TICK: u64 = 100;

/// 以 0.1 微秒为单位的无符号定点计数。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// 纪元时刻。
    pub const ZERO: Self = Self(0);

    /// 由原始计数构造。
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    /// 原始计数。
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// 将时长换算为计数，不足一个单位的部分截断，溢出时饱和。
    pub fn from_duration(duration: Duration) -> Self {
        let whole = duration.as_secs().saturating_mul(TICKS_PER_SECOND);
        let fraction = u64::from(duration.subsec_nanos()) / NANOS_PER_TICK;
        Self(whole.saturating_add(fraction))
    }

    /// 换算回时长。
    pub fn as_duration(self) -> Duration {
        let secs = self.0 / TICKS_PER_SECOND;
        let nanos = (self.0 % TICKS_PER_SECOND) * NANOS_PER_TICK;
        Duration::new(secs, nanos as u32)
    }

    /// 自纪元起经过的整秒数。
    pub const fn whole_seconds(self) -> u64 {
        self.0 / TICKS_PER_SECOND
    }

    /// 与更早时间戳之间的间隔；若 `earlier` 实际更晚则返回零。
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        Timestamp(self.0.saturating_sub(earlier.0)).as_duration()
    }
}

/// 基于操作系统单调时钟的时间源。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 记录编码器需要一个不受墙上时间调整影响、可直接比较先后的时间戳；
/// - 以进程内固定基准点为纪元，避免不同平台单调时钟起点差异渗入数值语义。
///
/// ## 逻辑（How）
/// - 首次调用时以 `OnceLock` 记录基准 [`Instant`]；
/// - 之后每次取 `elapsed()` 并按 0.1 微秒截断换算。
///
/// ## 契约（What）
/// - 同一进程内返回值单调不减；
/// - 基准点在进程内只初始化一次，所有实例共享。
#[derive(Clone, Copy, Debug, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    /// 读取当前时间戳。
    pub fn now(&self) -> Timestamp {
        Timestamp::from_duration(base_instant().elapsed())
    }
}

/// 读取当前时间戳，等价于 `MonotonicClock.now()`。
pub fn now() -> Timestamp {
    MonotonicClock.now()
}

fn base_instant() -> Instant {
    static BASE: OnceLock<Instant> = OnceLock::new();
    *BASE.get_or_init(Instant::now)
}
