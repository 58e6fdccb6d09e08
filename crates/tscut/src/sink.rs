//! パケットおよび番組情報の出力先と、入力の駆動。

use std::io::{self, Read, Write};

use crate::packet::Packet;

/// フィルターからパケットを受け取る出力先。
pub trait PacketSink {
    /// 最初のパケットの前に一度だけ呼ばれる。
    fn start(&mut self) {}

    /// パケットを処理する。
    ///
    /// 偽を返すと上流はパケットの供給を停止する。
    fn handle_packet(&mut self, packet: &Packet) -> bool;

    /// 最後のパケットの後に一度だけ呼ばれる。
    fn end(&mut self) -> bool {
        true
    }
}

impl<T: PacketSink + ?Sized> PacketSink for &mut T {
    #[inline]
    fn start(&mut self) {
        (**self).start()
    }

    #[inline]
    fn handle_packet(&mut self, packet: &Packet) -> bool {
        (**self).handle_packet(packet)
    }

    #[inline]
    fn end(&mut self) -> bool {
        (**self).end()
    }
}

/// パケットをそのまま書き出す出力先。
pub struct WriteSink<W> {
    w: W,
}

impl<W: Write> WriteSink<W> {
    /// `w`へ書き出す`WriteSink`を生成する。
    #[inline]
    pub fn new(w: W) -> WriteSink<W> {
        WriteSink { w }
    }

    /// `WriteSink`を消費して内包するライターを返す。
    #[inline]
    pub fn into_inner(self) -> W {
        self.w
    }
}

impl<W: Write> PacketSink for WriteSink<W> {
    fn handle_packet(&mut self, packet: &Packet) -> bool {
        match self.w.write_all(packet.as_bytes()) {
            Ok(()) => true,
            Err(e) => {
                log::error!("failed to write a packet: {}", e);
                false
            }
        }
    }

    fn end(&mut self) -> bool {
        match self.w.flush() {
            Ok(()) => true,
            Err(e) => {
                log::error!("failed to flush: {}", e);
                false
            }
        }
    }
}

/// `r`からTSパケットを読み込み、`sink`へ供給する。
///
/// `sink`が偽を返すかEOFに達するまで読み込み、最後に`end`の結果を返す。
/// 同期的に1パケットずつ受け渡す。
pub fn feed_packets<R: Read, S: PacketSink>(mut r: R, sink: &mut S) -> io::Result<bool> {
    sink.start();

    while let Some(packet) = Packet::read(&mut r)? {
        if !sink.handle_packet(&packet) {
            break;
        }
    }

    Ok(sink.end())
}

/// 番組の放送時間帯を表すレコード。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// オリジナルネットワーク識別。
    pub nid: u16,
    /// トランスポートストリーム識別。
    pub tsid: u16,
    /// サービス識別。
    pub sid: u16,
    /// イベント識別。
    pub eid: u16,
    /// 番組開始時刻（UNIXエポックからのミリ秒）。
    pub start_time: i64,
    /// 番組の継続時間（ミリ秒）。
    pub duration: i64,
}

/// [`EventRecord`]を受け取る出力先。
pub trait EventEmitter {
    /// レコードを出力する。
    fn emit(&mut self, record: &EventRecord);
}

impl<T: EventEmitter + ?Sized> EventEmitter for &mut T {
    #[inline]
    fn emit(&mut self, record: &EventRecord) {
        (**self).emit(record)
    }
}

/// レコードを1行1JSONで書き出す出力先。
pub struct JsonlEmitter<W> {
    w: W,
}

impl<W: Write> JsonlEmitter<W> {
    /// `w`へ書き出す`JsonlEmitter`を生成する。
    #[inline]
    pub fn new(w: W) -> JsonlEmitter<W> {
        JsonlEmitter { w }
    }
}

impl<W: Write> EventEmitter for JsonlEmitter<W> {
    fn emit(&mut self, record: &EventRecord) {
        let result = serde_json::to_writer(&mut self.w, record)
            .map_err(io::Error::from)
            .and_then(|()| self.w.write_all(b"\n"))
            .and_then(|()| self.w.flush());
        if let Err(e) = result {
            log::error!("failed to write a record: {}", e);
        }
    }
}
