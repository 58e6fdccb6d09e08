//! PSI/SIセクションを分離するためのモジュール。

use arrayvec::ArrayVec;
use fxhash::FxHashMap;

use crate::packet::Packet;
use crate::pid::Pid;
use crate::psi::{Section, SectionError};

/// [`SectionDemuxer`]が分離したセクションを受け取るハンドラー。
pub trait TableHandler {
    /// パケットを処理する前に呼ばれ、そのPIDをセクションとして分離するかどうかを返す。
    ///
    /// 偽を返したPIDの分離状態は破棄される。
    /// ハンドラーがここで返す判断を変えることで、
    /// 分離対象のPIDは実行中にいつでも追加・削除できる。
    fn on_packet(&mut self, packet: &Packet) -> bool;

    /// セクションを分離した際に呼ばれる。
    fn on_section(&mut self, packet: &Packet, section: &Section);
}

impl<T: TableHandler + ?Sized> TableHandler for &mut T {
    #[inline]
    fn on_packet(&mut self, packet: &Packet) -> bool {
        (**self).on_packet(packet)
    }

    #[inline]
    fn on_section(&mut self, packet: &Packet, section: &Section) {
        (**self).on_section(packet, section)
    }
}

/// ハンドラーが選択したPIDのPSIセクションを分離する。
pub struct SectionDemuxer<T> {
    handler: T,
    states: FxHashMap<Pid, PidState>,
}

impl<T> SectionDemuxer<T> {
    /// `SectionDemuxer`を生成する。
    pub fn new(handler: T) -> SectionDemuxer<T> {
        SectionDemuxer {
            handler,
            states: FxHashMap::default(),
        }
    }

    /// 内包するハンドラーを参照で返す。
    #[inline]
    pub fn handler(&self) -> &T {
        &self.handler
    }

    /// 内包するハンドラーを可変参照で返す。
    #[inline]
    pub fn handler_mut(&mut self) -> &mut T {
        &mut self.handler
    }

    /// `SectionDemuxer`を消費して内包するハンドラーを返す。
    #[inline]
    pub fn into_handler(self) -> T {
        self.handler
    }
}

impl<T: TableHandler> SectionDemuxer<T> {
    /// [`Packet`]を処理してセクションを分離する。
    pub fn feed(&mut self, packet: &Packet) {
        if !packet.is_valid() {
            log::trace!("broken packet: {:?}", packet.pid());
            return;
        }

        if !self.handler.on_packet(packet) {
            self.states.remove(&packet.pid());
            return;
        }

        let Some(payload) = packet.payload().filter(|p| !p.is_empty()) else {
            return;
        };

        let state = self
            .states
            .entry(packet.pid())
            .or_insert_with(PidState::new);

        let cc = packet.continuity_counter();
        let is_discontinuity = packet
            .adaptation_field()
            .map_or(false, |af| af.discontinuity_indicator);
        let cc_ok = is_discontinuity
            || state.last_cc >= 0x10
            || (state.last_cc + 1) & 0x0F == cc;
        state.last_cc = cc;
        if !cc_ok {
            // 欠落をまたいだセクションは完成しない
            log::debug!("continuity lost: {:?}", packet.pid());
            state.buffer.clear();
            state.started = false;
        }

        if packet.unit_start() {
            let pointer = payload[0] as usize;
            let Some(rest) = payload.get(1..) else {
                return;
            };
            if rest.len() < pointer {
                log::debug!("pointer field overruns the payload: {:?}", packet.pid());
                return;
            }
            let (tail, next) = rest.split_at(pointer);

            // ポインターより前は前のセクションの続き
            if !tail.is_empty() && state.started && cc_ok {
                state.write(&mut self.handler, packet, tail);
            }

            state.buffer.clear();
            state.started = true;
            if !next.is_empty() {
                state.write(&mut self.handler, packet, next);
            }
        } else if state.started && cc_ok {
            state.write(&mut self.handler, packet, payload);
        }
    }
}

struct PidState {
    last_cc: u8,
    started: bool,
    buffer: Box<ArrayVec<u8, 4096>>,
}

impl PidState {
    fn new() -> PidState {
        PidState {
            last_cc: 0x10,
            started: false,
            buffer: Box::new(ArrayVec::new()),
        }
    }

    fn write<T: TableHandler>(&mut self, handler: &mut T, packet: &Packet, data: &[u8]) {
        // バッファに収まる形でdataを追記
        let len = std::cmp::min(self.buffer.remaining_capacity(), data.len());
        let _result = self.buffer.try_extend_from_slice(&data[..len]);
        debug_assert!(_result.is_ok());

        let mut buf = self.buffer.as_slice();
        loop {
            let consumed = match Section::read(buf) {
                Err(SectionError::Incomplete | SectionError::Stuffing) => break,
                Err(SectionError::Malformed(n)) => {
                    log::debug!("malformed section: {:?}", packet.pid());
                    n
                }
                Err(SectionError::BadCrc(n)) => {
                    log::debug!("section crc mismatch: {:?}", packet.pid());
                    n
                }
                Ok((section, n)) => {
                    handler.on_section(packet, &section);
                    n
                }
            };

            // 読み込んだセクションの分バッファを進める
            buf = &buf[consumed..];
        }

        if buf.len() < self.buffer.len() {
            // 処理した部分を捨てる
            let remaining = buf.len();
            let offset = self.buffer.len() - remaining;
            self.buffer.copy_within(offset.., 0);
            self.buffer.truncate(remaining);
        }
    }
}
