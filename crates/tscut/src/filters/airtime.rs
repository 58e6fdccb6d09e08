//! 対象番組の放送時間帯を追跡するフィルター。

use crate::demux::{SectionDemuxer, TableHandler};
use crate::event::{self, PfBuffer, Resolution};
use crate::packet::Packet;
use crate::pid::Pid;
use crate::psi::table::{Eit, EitEvent, EventId, ServiceId};
use crate::psi::{Section, VersionTracker};
use crate::sink::{EventEmitter, EventRecord, PacketSink};

/// [`AirtimeTracker`]の設定。
#[derive(Debug, Clone, Copy)]
pub struct AirtimeTrackerOptions {
    /// 対象のサービス識別。
    pub sid: ServiceId,
    /// 対象のイベント識別。
    pub eid: EventId,
}

/// EIT［現在／次］を監視して対象番組の放送時間帯を発行するフィルター。
///
/// 対象イベントが現在または次として載っている間、更新のたびに
/// [`EventRecord`]を発行する。対象イベントが確定的に存在しなくなると
/// 以降のパケットで消費の停止を上流へ伝える。パケットは下流へ流さない。
pub struct AirtimeTracker<E> {
    demux: SectionDemuxer<AirtimeTables<E>>,
}

impl<E: EventEmitter> AirtimeTracker<E> {
    /// `emitter`へレコードを発行する`AirtimeTracker`を生成する。
    pub fn new(options: AirtimeTrackerOptions, emitter: E) -> AirtimeTracker<E> {
        let tables = AirtimeTables {
            sid: options.sid,
            eid: options.eid,
            versions: VersionTracker::new(),
            pf: PfBuffer::new(),
            emitter,
            done: false,
        };
        log::debug!("demux += EIT");

        AirtimeTracker {
            demux: SectionDemuxer::new(tables),
        }
    }
}

impl<E: EventEmitter> PacketSink for AirtimeTracker<E> {
    fn handle_packet(&mut self, packet: &Packet) -> bool {
        self.demux.feed(packet);
        !self.demux.handler().done
    }
}

/// EITを監視して放送時間帯を発行するハンドラー。
struct AirtimeTables<E> {
    sid: ServiceId,
    eid: EventId,
    versions: VersionTracker,
    pf: PfBuffer,
    emitter: E,
    done: bool,
}

impl<E: EventEmitter> AirtimeTables<E> {
    fn handle_eit(&mut self, section: &Section) {
        let Some(eit) = self.versions.read::<Eit>(section) else {
            return;
        };

        if eit.service_id != self.sid {
            log::warn!("EIT.SID#{:04X} unmatched, skip", eit.service_id);
            return;
        }

        let Some(events) = self.pf.update(&eit) else {
            return;
        };

        match event::resolve(&events, self.eid) {
            Resolution::Present(ev) => {
                log::debug!("event#{:04X} has started", self.eid);
                self.write_event_info(&eit, &ev);
            }
            Resolution::Following(ev) => {
                log::debug!("event#{:04X} will start soon", self.eid);
                self.write_event_info(&eit, &ev);
            }
            Resolution::NoEvents => {
                log::error!("no event in EIT");
                self.done = true;
            }
            Resolution::NoFollowing => {
                log::warn!("no following event in EIT");
                self.done = true;
            }
            Resolution::Unlisted => {
                log::error!("event#{:04X} might have been canceled", self.eid);
                self.done = true;
            }
        }
    }

    fn write_event_info(&mut self, eit: &Eit, event: &EitEvent) {
        let record = EventRecord {
            nid: eit.original_network_id.get(),
            tsid: eit.transport_stream_id.get(),
            sid: eit.service_id.get(),
            eid: event.event_id.get(),
            start_time: event.start_time.unix_millis(),
            duration: event.duration as i64 * 1_000,
        };
        self.emitter.emit(&record);
    }
}

impl<E: EventEmitter> TableHandler for AirtimeTables<E> {
    fn on_packet(&mut self, packet: &Packet) -> bool {
        packet.pid() == Pid::EIT
    }

    fn on_section(&mut self, packet: &Packet, section: &Section) {
        let _ = packet;
        if section.table_id == Eit::TABLE_ID_PF_ACTUAL {
            self.handle_eit(section);
        }
    }
}
