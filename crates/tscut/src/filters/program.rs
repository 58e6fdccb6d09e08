//! 対象番組の時間帯だけを通すパケットゲート。

use chrono::Duration;

use crate::clock::{compare_pcr, PcrClock, PcrRange};
use crate::demux::{SectionDemuxer, TableHandler};
use crate::event::{self, PfBuffer, Resolution};
use crate::packet::Packet;
use crate::pid::Pid;
use crate::psi::table::{Eit, EitEvent, EventId, Pat, Pmt, ServiceId};
use crate::psi::{Section, VersionTracker};
use crate::sink::PacketSink;

/// [`ProgramFilter`]の設定。
#[derive(Debug, Clone, Copy)]
pub struct ProgramFilterOptions {
    /// 対象のサービス識別。
    pub sid: ServiceId,
    /// 対象のイベント識別。
    pub eid: EventId,
    /// 壁時計とPCRの対応付け。
    pub clock: PcrClock,
    /// 番組開始時刻より手前に取る余裕。
    pub start_margin: Duration,
    /// 番組終了時刻より後ろに取る余裕。
    pub end_margin: Duration,
    /// 開始PCRを待たずにPATを送出するかどうか。
    pub pre_streaming: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitReady,
    Streaming,
}

/// 対象番組の時間帯だけを下流へ通すフィルター。
///
/// 上流のサービスフィルターにより単一サービスへ絞り込まれたTSを前提とする。
/// EIT［現在／次］から求めた番組の時間窓とストリーム自身のPCRを突き合わせ、
/// 窓に入った時点で最後に受信したPAT・PMTを先頭に付けて送出を始める。
pub struct ProgramFilter<S> {
    options: ProgramFilterOptions,
    demux: SectionDemuxer<ProgramTables>,
    sink: S,
    state: State,
    last_pat: Vec<Packet>,
    last_pmt: Vec<Packet>,
}

impl<S: PacketSink> ProgramFilter<S> {
    /// `sink`を下流とする`ProgramFilter`を生成する。
    pub fn new(options: ProgramFilterOptions, sink: S) -> ProgramFilter<S> {
        let tables = ProgramTables {
            sid: options.sid,
            eid: options.eid,
            clock: options.clock,
            start_margin: options.start_margin,
            end_margin: options.end_margin,
            versions: VersionTracker::new(),
            pf: PfBuffer::new(),
            pmt_pid: None,
            pcr_pid: None,
            pcr_range: None,
            streaming: false,
            stop: false,
        };
        log::debug!("demux += PAT EIT");

        ProgramFilter {
            options,
            demux: SectionDemuxer::new(tables),
            sink,
            state: State::WaitReady,
            last_pat: Vec::new(),
            last_pmt: Vec::new(),
        }
    }

    fn wait_ready(&mut self, packet: &Packet) -> bool {
        if self.demux.handler().stop {
            log::warn!("canceled");
            return false;
        }

        let pid = packet.pid();

        if pid == Pid::PAT {
            if self.options.pre_streaming {
                return self.sink.handle_packet(packet);
            }
            // 最後に受信したPATのパケットを保存する
            if packet.unit_start() {
                self.last_pat.clear();
            }
            self.last_pat.push(packet.clone());
        } else if self.demux.handler().pmt_pid == Some(pid) {
            // 最後に受信したPMTのパケットを保存する
            if packet.unit_start() {
                self.last_pmt.clear();
            }
            self.last_pmt.push(packet.clone());
        } else {
            // その他のパケットは捨てる
        }

        let tables = self.demux.handler();
        let (Some(pcr_pid), Some(range)) = (tables.pcr_pid, tables.pcr_range) else {
            return true;
        };

        if pid != pcr_pid {
            return true;
        }

        let Some(pcr) = packet.pcr() else {
            // PCRのPIDでもPCRを載せないパケットを流す局がある
            log::trace!("no PCR value in PCR#{:04X}", pid);
            return true;
        };
        let pcr = pcr.ticks() as i64;

        if compare_pcr(pcr, range.end) >= 0 {
            log::info!("reached the end PCR");
            return false;
        }

        if compare_pcr(pcr, range.start) < 0 {
            return true;
        }

        log::info!("reached the start PCR");

        // 保留していたパケットを送出する
        if !self.options.pre_streaming {
            // PATを1枚も受信せずに開始PCRへ到達することはあり得ない
            assert!(!self.last_pat.is_empty());
            for pat in &self.last_pat {
                if !self.sink.handle_packet(pat) {
                    return false;
                }
            }
            self.last_pat.clear();
        }
        for pmt in &self.last_pmt {
            if !self.sink.handle_packet(pmt) {
                return false;
            }
        }
        self.last_pmt.clear();

        self.state = State::Streaming;
        self.demux.handler_mut().streaming = true;
        self.sink.handle_packet(packet)
    }

    fn do_streaming(&mut self, packet: &Packet) -> bool {
        let tables = self.demux.handler();

        if tables.stop {
            log::info!("done");
            return false;
        }

        if tables.pcr_pid == Some(packet.pid()) {
            // PCRを載せないパケットはそのまま下流へ流す
            if let (Some(pcr), Some(range)) = (packet.pcr(), tables.pcr_range) {
                if compare_pcr(pcr.ticks() as i64, range.end) >= 0 {
                    log::info!("reached the end PCR");
                    return false;
                }
            }
        }

        self.sink.handle_packet(packet)
    }
}

impl<S: PacketSink> PacketSink for ProgramFilter<S> {
    fn start(&mut self) {
        self.sink.start()
    }

    fn handle_packet(&mut self, packet: &Packet) -> bool {
        self.demux.feed(packet);

        match self.state {
            State::WaitReady => self.wait_ready(packet),
            State::Streaming => self.do_streaming(packet),
        }
    }

    fn end(&mut self) -> bool {
        self.sink.end()
    }
}

/// PAT・PMT・EITを監視して切り出しの準備状態を更新するハンドラー。
struct ProgramTables {
    sid: ServiceId,
    eid: EventId,
    clock: PcrClock,
    start_margin: Duration,
    end_margin: Duration,

    versions: VersionTracker,
    pf: PfBuffer,

    pmt_pid: Option<Pid>,
    pcr_pid: Option<Pid>,
    pcr_range: Option<PcrRange>,
    /// 外側の状態機械がStreamingへ遷移したかどうか。EITの判定に使う。
    streaming: bool,
    stop: bool,
}

impl ProgramTables {
    fn handle_pat(&mut self, packet: &Packet, section: &Section) {
        if packet.pid() != Pid::PAT {
            log::warn!("PAT on PID#{:04X}, skip", packet.pid());
            return;
        }

        let Some(pat) = self.versions.read::<Pat>(section) else {
            return;
        };

        // 対象サービスを含むことは上流のサービスフィルターが保証する
        let Some(program) = pat.pmts.iter().find(|p| p.program_number == self.sid) else {
            panic!("PAT without SID#{:04X}", self.sid);
        };

        if let Some(old) = self.pmt_pid.take() {
            log::debug!("demux -= PMT#{:04X}", old);
        }

        self.pmt_pid = Some(program.program_map_pid);
        log::debug!("demux += PMT#{:04X}", program.program_map_pid);
    }

    fn handle_pmt(&mut self, section: &Section) {
        let Some(pmt) = self.versions.read::<Pmt>(section) else {
            return;
        };

        if pmt.program_number != self.sid {
            log::warn!("PMT.SID#{:04X} unmatched, skip", pmt.program_number);
            return;
        }

        self.pcr_pid = Some(pmt.pcr_pid);
        log::debug!("PCR#{:04X}", pmt.pcr_pid);
    }

    fn handle_eit(&mut self, section: &Section) {
        let Some(eit) = self.versions.read::<Eit>(section) else {
            return;
        };

        if eit.service_id != self.sid {
            return;
        }

        let Some(events) = self.pf.update(&eit) else {
            return;
        };

        match event::resolve(&events, self.eid) {
            Resolution::Present(ev) => {
                log::debug!("event#{:04X} has started", self.eid);
                self.update_pcr_range(&ev);
            }
            Resolution::Following(ev) => {
                log::debug!("event#{:04X} will start soon", self.eid);
                self.update_pcr_range(&ev);
            }
            Resolution::NoEvents => {
                log::error!("no event in EIT, stop");
                self.stop = true;
            }
            Resolution::NoFollowing => {
                log::warn!("no following event in EIT");
                if self.streaming {
                    // 終了PCRに達するまで送出を続ける
                    return;
                }
                log::error!("event#{:04X} might have been canceled", self.eid);
                self.stop = true;
            }
            Resolution::Unlisted => {
                if self.streaming {
                    // 終了PCRに達するまで送出を続ける
                    return;
                }
                log::error!("event#{:04X} might have been canceled", self.eid);
                self.stop = true;
            }
        }
    }

    fn update_pcr_range(&mut self, event: &EitEvent) {
        let Some(start_time) = event.start_time.to_naive() else {
            log::warn!("broken start time in EIT, skip");
            return;
        };

        let start = start_time - self.start_margin;
        // 終了余裕は開始余裕を引く前の正味の終了時刻から延ばす
        let duration = Duration::seconds(event.duration as i64) + self.end_margin;
        let end = start_time + duration;

        let range = PcrRange {
            start: self.clock.time_to_pcr(start),
            end: self.clock.time_to_pcr(end),
        };
        log::info!(
            "updated PCR range: {:011X} ({}) .. {:011X} ({})",
            range.start,
            start,
            range.end,
            end,
        );
        self.pcr_range = Some(range);
    }
}

impl TableHandler for ProgramTables {
    fn on_packet(&mut self, packet: &Packet) -> bool {
        let pid = packet.pid();
        pid == Pid::PAT || pid == Pid::EIT || self.pmt_pid == Some(pid)
    }

    fn on_section(&mut self, packet: &Packet, section: &Section) {
        match section.table_id {
            Pat::TABLE_ID => self.handle_pat(packet, section),
            Pmt::TABLE_ID => self.handle_pmt(section),
            Eit::TABLE_ID_PF_ACTUAL => self.handle_eit(section),
            _ => {}
        }
    }
}
