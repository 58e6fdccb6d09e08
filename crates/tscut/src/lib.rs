//! ARIB放送のMPEG2-TSから単一番組の放送時間帯を切り出すためのクレート。
//!
//! 上流のサービスフィルターにより単一サービスへ絞り込まれたTSを入力とし、
//! EIT［現在／次］とストリーム自身のPCRから対象番組の時間窓を求めて、
//! その窓に属するパケットだけをPAT・PMTで挟んで下流へ流す。

#![deny(missing_docs)]

pub mod clock;
pub mod demux;
pub mod event;
pub mod filters;
pub mod packet;
pub mod pid;
pub mod psi;
pub mod sink;
pub mod time;
mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use packet::Packet;
pub use pid::Pid;
