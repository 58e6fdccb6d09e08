//! PCRの演算と壁時計との対応付け。
//!
//! PCRは27MHzで数えられる42ビット（33ビット×300＋9ビット）の時計であり、
//! `2^33 × 300`で一周する。このモジュールの演算はすべてその折り返しを
//! 考慮したモジュラー演算である。

use chrono::NaiveDateTime;

/// PCRが一周する値（`2^33 × 300`）。
pub const PCR_WRAP: i64 = (1 << 33) * 300;

/// 1ミリ秒あたりのPCRティック数。
pub const PCR_TICKS_PER_MS: i64 = 27_000;

/// 折り返しを考慮して2つのPCR値を比較する。
///
/// `lhs − rhs`と`lhs − (PCR_WRAP + rhs)`のうち絶対値の小さい方を返す。
/// 比較対象の実時間での間隔が`PCR_WRAP`の半分未満であることを前提とし、
/// 呼び出し側は戻り値の符号のみを使用する。
pub fn compare_pcr(lhs: i64, rhs: i64) -> i64 {
    let a = lhs - rhs;
    let b = lhs - (PCR_WRAP + rhs);
    if a.abs() < b.abs() {
        a
    } else {
        b
    }
}

/// 壁時計（日本標準時）とストリームのPCRの対応付け。
///
/// ある時点の壁時計とPCR値の組を外部から与えられ、
/// 以降の壁時計とPCRの相互変換の基準とする。
/// ストリームのPCRベースが不連続になっても補正は行わない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcrClock {
    time: NaiveDateTime,
    pcr: i64,
}

impl PcrClock {
    /// 時刻`time`のPCR値が`pcr`であったものとして`PcrClock`を生成する。
    #[inline]
    pub fn new(time: NaiveDateTime, pcr: i64) -> PcrClock {
        PcrClock { time, pcr }
    }

    /// 壁時計`t`をPCR値に変換する。
    ///
    /// `t`は基準時刻より過去でも構わない。戻り値は`[0, PCR_WRAP)`に正規化される。
    pub fn time_to_pcr(&self, t: NaiveDateTime) -> i64 {
        let ms = (t - self.time).num_milliseconds();
        let mut pcr = self.pcr + ms * PCR_TICKS_PER_MS;
        while pcr < 0 {
            pcr += PCR_WRAP;
        }
        pcr % PCR_WRAP
    }
}

/// 切り出し対象となるPCRの範囲。
///
/// `start`・`end`はいずれも`[0, PCR_WRAP)`のPCR値で、
/// 折り返しを挟む場合は数値として`end < start`になり得る。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcrRange {
    /// 開始PCR。
    pub start: i64,
    /// 終了PCR。
    pub end: i64,
}
