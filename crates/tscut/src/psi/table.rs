//! PSI/SIテーブルの定義。
//!
//! MPEG-2 SystemsのPAT・PMTと、ARIB STD-B10のEIT［現在／次］のうち、
//! 番組の切り出しに必要な部分のみを読み取る。

use std::num::NonZeroU16;

use crate::pid::Pid;
use crate::psi::{FromSection, Section};
use crate::time::DateTime;
use crate::utils::BytesExt;

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            /// ゼロ以外の`n`から生成する。
            #[inline]
            pub fn new(n: u16) -> Option<$name> {
                NonZeroU16::new(n).map($name)
            }

            /// 値を`u16`で返す。
            #[inline]
            pub fn get(self) -> u16 {
                self.0.get()
            }
        }

        crate::utils::delegate_fmt!($name);
    };
}

/// トランスポートストリーム識別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransportStreamId(pub NonZeroU16);

impl_id!(TransportStreamId);

/// ネットワーク識別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetworkId(pub NonZeroU16);

impl_id!(NetworkId);

/// サービス識別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceId(pub NonZeroU16);

impl_id!(ServiceId);

/// イベント識別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub NonZeroU16);

impl_id!(EventId);

/// PATに並ぶ、放送番組番号とそのPMTのPIDの組。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatProgram {
    /// 放送番組番号識別。
    pub program_number: ServiceId,
    /// PMTのPID。
    pub program_map_pid: Pid,
}

/// PAT（Program Association Table）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pat {
    /// トランスポートストリーム識別。
    pub transport_stream_id: TransportStreamId,

    /// NITのPID。
    pub network_pid: Pid,

    /// PMTのPIDを格納する配列。
    pub pmts: Vec<PatProgram>,
}

impl Pat {
    /// PATのテーブルID。
    pub const TABLE_ID: u8 = 0x00;
}

impl FromSection<'_> for Pat {
    fn from_section(section: &Section) -> Option<Pat> {
        if section.table_id != Self::TABLE_ID {
            log::debug!("PAT: unexpected table_id {:#04X}", section.table_id);
            return None;
        }
        let Some(header) = section.header.as_ref() else {
            log::debug!("PAT: extended header missing");
            return None;
        };

        // TS識別0のPATは深夜の停波前後などに流れる壊れたテーブル
        let Some(transport_stream_id) = TransportStreamId::new(header.table_id_extension) else {
            log::debug!("PAT: ts_id 0, skip");
            return None;
        };

        let mut network_pid = Pid::default();
        let mut pmts = Vec::new();
        for entry in section.payload.chunks_exact(4) {
            let pid = Pid::read(&entry[2..]);
            match ServiceId::new(entry[..2].read_be_16()) {
                Some(program_number) => pmts.push(PatProgram {
                    program_number,
                    program_map_pid: pid,
                }),
                // 番組番号0のエントリーが指すのはNIT
                None => network_pid = pid,
            }
        }

        Some(Pat {
            transport_stream_id,
            network_pid,
            pmts,
        })
    }
}

/// PMT（Program Map Table）。
///
/// ストリームのループは読み取らない。PCRのPIDを知るためだけに使用する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pmt {
    /// 放送番組番号識別。
    pub program_number: ServiceId,
    /// PCRのPID。
    pub pcr_pid: Pid,
}

impl Pmt {
    /// PMTのテーブルID。
    pub const TABLE_ID: u8 = 0x02;
}

impl FromSection<'_> for Pmt {
    fn from_section(section: &Section) -> Option<Pmt> {
        if section.table_id != Self::TABLE_ID {
            log::debug!("PMT: unexpected table_id {:#04X}", section.table_id);
            return None;
        }
        let Some(header) = section.header.as_ref() else {
            log::debug!("PMT: extended header missing");
            return None;
        };

        let Some(program_number) = ServiceId::new(header.table_id_extension) else {
            log::debug!("PMT: program_number 0");
            return None;
        };
        if section.payload.len() < 2 {
            log::debug!("PMT: too short");
            return None;
        }

        Some(Pmt {
            program_number,
            pcr_pid: Pid::read(&section.payload[..2]),
        })
    }
}

/// EIT［現在／次］に含まれるイベント。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EitEvent {
    /// イベント識別。
    pub event_id: EventId,
    /// 開始時間（日本標準時）。
    pub start_time: DateTime,
    /// 継続時間（単位は秒）。
    pub duration: u32,
}

/// EIT（Event Information Table）［自TS・現在／次］。
///
/// セクション0が現在、セクション1が次のイベントを運ぶ。
/// 記述子は読み取らない。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eit {
    /// サービス識別。
    pub service_id: ServiceId,
    /// バージョン番号（5ビット）。
    pub version_number: u8,
    /// セクション番号。
    pub section_number: u8,
    /// 最終セクション番号。
    pub last_section_number: u8,
    /// トランスポートストリーム識別。
    pub transport_stream_id: TransportStreamId,
    /// オリジナルネットワーク識別。
    pub original_network_id: NetworkId,
    /// セグメント最終セクション番号。
    pub segment_last_section_number: u8,
    /// 最終テーブル識別。
    pub last_table_id: u8,
    /// イベントを格納する配列。
    pub events: Vec<EitEvent>,
}

impl Eit {
    /// 自TSにおけるイベント［現在／次］を格納するEITのテーブルID。
    pub const TABLE_ID_PF_ACTUAL: u8 = 0x4E;
}

impl FromSection<'_> for Eit {
    fn from_section(section: &Section) -> Option<Eit> {
        if section.table_id != Self::TABLE_ID_PF_ACTUAL {
            log::debug!("EIT: unexpected table_id {:#04X}", section.table_id);
            return None;
        }
        let Some(header) = section.header.as_ref() else {
            log::debug!("EIT: extended header missing");
            return None;
        };
        let Some(service_id) = ServiceId::new(header.table_id_extension) else {
            log::debug!("EIT: service_id 0");
            return None;
        };

        let payload = section.payload;
        if payload.len() < 6 {
            log::debug!("EIT: too short");
            return None;
        }
        let Some(transport_stream_id) = TransportStreamId::new(payload[..2].read_be_16()) else {
            log::debug!("EIT: ts_id 0");
            return None;
        };
        let Some(original_network_id) = NetworkId::new(payload[2..4].read_be_16()) else {
            log::debug!("EIT: network_id 0");
            return None;
        };
        let segment_last_section_number = payload[4];
        let last_table_id = payload[5];

        let mut rest = &payload[6..];
        let mut events = Vec::new();
        while !rest.is_empty() {
            if rest.len() < 12 {
                log::debug!("EIT: truncated event");
                return None;
            }

            let Some(event_id) = EventId::new(rest[..2].read_be_16()) else {
                log::debug!("EIT: event_id 0");
                return None;
            };
            let start_time = DateTime::read(rest[2..7].try_into().unwrap());
            let duration = rest[7..10].read_bcd_second();

            // 記述子ループは読み飛ばす
            let descriptors_len = (rest[10..12].read_be_16() & 0x0FFF) as usize;
            let Some(next) = rest[12..].get(descriptors_len..) else {
                log::debug!("EIT: truncated descriptors");
                return None;
            };
            rest = next;

            events.push(EitEvent {
                event_id,
                start_time,
                duration,
            });
        }

        Some(Eit {
            service_id,
            version_number: header.version,
            section_number: header.section_number,
            last_section_number: header.last_section_number,
            transport_stream_id,
            original_network_id,
            segment_last_section_number,
            last_table_id,
            events,
        })
    }
}
