//! テスト用のセクション・パケット生成器。

use chrono::{NaiveDate, NaiveDateTime};
use crc::{Crc, CRC_32_MPEG_2};

use crate::packet::Packet;
use crate::pid::Pid;
use crate::sink::PacketSink;

const CRC32_MPEG_2: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// 日本標準時の壁時計をISO 8601風の文字列から生成する。
pub(crate) fn jst(s: &str) -> NaiveDateTime {
    s.parse().unwrap()
}

/// セクションシンタクス付きのPSIセクションを生成する。
pub(crate) fn section(
    table_id: u8,
    ext: u16,
    version: u8,
    section_number: u8,
    last_section_number: u8,
    data: &[u8],
) -> Vec<u8> {
    let section_length = 5 + data.len() + 4;
    assert!(section_length <= 0x0FFF);

    let mut buf = vec![
        table_id,
        0xB0 | (section_length >> 8) as u8,
        section_length as u8,
    ];
    buf.extend_from_slice(&ext.to_be_bytes());
    buf.push(0b1100_0001 | (version << 1));
    buf.push(section_number);
    buf.push(last_section_number);
    buf.extend_from_slice(data);

    let crc = CRC32_MPEG_2.checksum(&buf);
    buf.extend_from_slice(&crc.to_be_bytes());
    buf
}

/// PATセクションを生成する。
pub(crate) fn pat_section(ts_id: u16, version: u8, programs: &[(u16, u16)]) -> Vec<u8> {
    let mut data = Vec::new();
    for &(program_number, pid) in programs {
        data.extend_from_slice(&program_number.to_be_bytes());
        data.extend_from_slice(&(0xE000 | pid).to_be_bytes());
    }
    section(0x00, ts_id, version, 0, 0, &data)
}

/// ストリームのループが空のPMTセクションを生成する。
pub(crate) fn pmt_section(sid: u16, version: u8, pcr_pid: u16) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&(0xE000 | pcr_pid).to_be_bytes());
    // program_info_length = 0
    data.extend_from_slice(&0xF000_u16.to_be_bytes());
    section(0x02, sid, version, 0, 0, &data)
}

/// EIT［現在／次］のサブテーブルを特定するパラメーター。
pub(crate) struct EitParams {
    pub sid: u16,
    pub version: u8,
    pub section_number: u8,
    pub last_section_number: u8,
    pub tsid: u16,
    pub nid: u16,
}

impl EitParams {
    pub fn new(sid: u16, version: u8, section_number: u8) -> EitParams {
        EitParams {
            sid,
            version,
            section_number,
            last_section_number: 1,
            tsid: 0x1234,
            nid: 0x0001,
        }
    }
}

/// EITのイベント定義。
#[derive(Debug, Clone, Copy)]
pub(crate) struct TestEvent {
    pub eid: u16,
    pub start: NaiveDateTime,
    pub duration: u32,
}

/// `start`（日本標準時）から`duration`秒のイベント定義を生成する。
pub(crate) fn event(eid: u16, start: &str, duration: u32) -> TestEvent {
    TestEvent {
        eid,
        start: jst(start),
        duration,
    }
}

fn bcd(n: u32) -> u8 {
    (((n / 10) << 4) | (n % 10)) as u8
}

/// EIT［現在／次］のセクションを生成する。
pub(crate) fn eit_pf_section(params: &EitParams, events: &[TestEvent]) -> Vec<u8> {
    use chrono::{Datelike, Timelike};

    let mut data = Vec::new();
    data.extend_from_slice(&params.tsid.to_be_bytes());
    data.extend_from_slice(&params.nid.to_be_bytes());
    data.push(params.last_section_number);
    data.push(0x4E);

    for ev in events {
        data.extend_from_slice(&ev.eid.to_be_bytes());

        let mjd_epoch = NaiveDate::from_ymd_opt(1858, 11, 17).unwrap();
        let mjd = ev.start.date().signed_duration_since(mjd_epoch).num_days() as u16;
        data.extend_from_slice(&mjd.to_be_bytes());
        data.push(bcd(ev.start.hour()));
        data.push(bcd(ev.start.minute()));
        data.push(bcd(ev.start.second()));

        data.push(bcd(ev.duration / 3600));
        data.push(bcd(ev.duration / 60 % 60));
        data.push(bcd(ev.duration % 60));

        // running_status等＋記述子ループ長0
        data.extend_from_slice(&0x0000_u16.to_be_bytes());
    }

    section(
        0x4E,
        params.sid,
        params.version,
        params.section_number,
        params.last_section_number,
        &data,
    )
}

/// セクションをPSIのTSパケット列に分割する。
///
/// 先頭パケットにはポインターフィールド0を置く。
pub(crate) fn psi_packets(pid: Pid, cc_start: u8, section: &[u8]) -> Vec<Packet> {
    let mut packets = Vec::new();
    let mut rest = section;
    let mut cc = cc_start;
    let mut first = true;

    while first || !rest.is_empty() {
        let mut b = [0xFF_u8; 188];
        b[0] = 0x47;
        b[1] = (pid.get() >> 8) as u8;
        b[2] = pid.get() as u8;
        b[3] = 0x10 | (cc & 0x0F);

        let mut offset = 4;
        if first {
            b[1] |= 0x40;
            b[offset] = 0;
            offset += 1;
            first = false;
        }

        let len = std::cmp::min(188 - offset, rest.len());
        b[offset..offset + len].copy_from_slice(&rest[..len]);
        rest = &rest[len..];

        packets.push(Packet::from_bytes(b));
        cc = (cc + 1) & 0x0F;
    }

    packets
}

/// セクション1つをPSIのTSパケット1つに収める。
///
/// # パニック
///
/// セクションが1パケットに収まらない場合はパニックする。
pub(crate) fn psi_packet(pid: Pid, cc: u8, section: &[u8]) -> Packet {
    let packets = psi_packets(pid, cc, section);
    assert_eq!(packets.len(), 1);
    packets.into_iter().next().unwrap()
}

/// PCRを載せたアダプテーションフィールドのみのパケットを生成する。
pub(crate) fn pcr_packet(pid: Pid, cc: u8, ticks: u64) -> Packet {
    let base = ticks / 300;
    let extension = (ticks % 300) as u16;

    let mut b = [0xFF_u8; 188];
    b[0] = 0x47;
    b[1] = (pid.get() >> 8) as u8;
    b[2] = pid.get() as u8;
    b[3] = 0x20 | (cc & 0x0F);
    b[4] = 183;
    b[5] = 0b0001_0000;
    b[6..10].copy_from_slice(&((base >> 1) as u32).to_be_bytes());
    b[10] = (((base & 1) as u8) << 7) | 0b0111_1110 | ((extension >> 8) as u8 & 1);
    b[11] = extension as u8;

    Packet::from_bytes(b)
}

/// PCRを持たないアダプテーションフィールドのみのパケットを生成する。
pub(crate) fn af_packet(pid: Pid, cc: u8) -> Packet {
    let mut b = [0xFF_u8; 188];
    b[0] = 0x47;
    b[1] = (pid.get() >> 8) as u8;
    b[2] = pid.get() as u8;
    b[3] = 0x20 | (cc & 0x0F);
    b[4] = 183;
    b[5] = 0;

    Packet::from_bytes(b)
}

/// ペイロードだけを持つメディア風のパケットを生成する。
pub(crate) fn media_packet(pid: Pid, cc: u8) -> Packet {
    let mut b = [0xAA_u8; 188];
    b[0] = 0x47;
    b[1] = (pid.get() >> 8) as u8;
    b[2] = pid.get() as u8;
    b[3] = 0x10 | (cc & 0x0F);

    Packet::from_bytes(b)
}

/// 受け取ったパケットを記録する出力先。
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub packets: Vec<Packet>,
    pub started: u32,
    pub ended: u32,
    /// 偽にすると`handle_packet`が拒否を返す。
    pub accept: bool,
}

impl RecordingSink {
    pub fn new() -> RecordingSink {
        RecordingSink {
            accept: true,
            ..Default::default()
        }
    }

    /// 受け取ったパケットの(PID, continuity_counter)列を返す。
    pub fn trace(&self) -> Vec<(Pid, u8)> {
        self.packets
            .iter()
            .map(|p| (p.pid(), p.continuity_counter()))
            .collect()
    }
}

impl PacketSink for RecordingSink {
    fn start(&mut self) {
        self.started += 1;
    }

    fn handle_packet(&mut self, packet: &Packet) -> bool {
        self.packets.push(packet.clone());
        self.accept
    }

    fn end(&mut self) -> bool {
        self.ended += 1;
        true
    }
}
