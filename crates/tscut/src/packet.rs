//! MPEG2-TSのパケット。
//!
//! このクレートが読み取るのはヘッダーの各フィールドと、
//! アダプテーションフィールドのうち不連続指示とPCRのみである。

use std::fmt;
use std::io::{self, Read};

use crate::pid::Pid;
use crate::utils::BytesExt;

/// TSパケットの長さ。
pub const PACKET_LEN: usize = 188;

const SYNC_BYTE: u8 = 0x47;

/// 188バイト固定のTSパケット。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Packet {
    bytes: [u8; PACKET_LEN],
}

impl Packet {
    /// 生のバイト列から`Packet`を生成する。
    ///
    /// 内容の検査は行わない。[`Packet::is_valid`]で確かめられる。
    #[inline]
    pub const fn from_bytes(bytes: [u8; PACKET_LEN]) -> Packet {
        Packet { bytes }
    }

    /// パケット全体をバイト列として返す。
    #[inline]
    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.bytes
    }

    /// `r`から次のTSパケットを読み込む。
    ///
    /// 同期バイトから始まらない入力は同期バイトが現れるまで読み捨てる。
    /// EOFでは`Ok(None)`を返す。
    pub fn read<R: Read>(mut r: R) -> io::Result<Option<Packet>> {
        fn fill<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<bool> {
            match r.read_exact(buf) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
                Err(e) => Err(e),
            }
        }

        let mut bytes = [0; PACKET_LEN];
        if !fill(&mut r, &mut bytes)? {
            return Ok(None);
        }

        while bytes[0] != SYNC_BYTE {
            match memchr::memchr(SYNC_BYTE, &bytes[1..]) {
                Some(found) => {
                    // 同期バイトを先頭に詰め、欠けた分を読み足す
                    let skip = found + 1;
                    bytes.copy_within(skip.., 0);
                    if !fill(&mut r, &mut bytes[PACKET_LEN - skip..])? {
                        return Ok(None);
                    }
                }
                None => {
                    if !fill(&mut r, &mut bytes)? {
                        return Ok(None);
                    }
                }
            }
        }

        Ok(Some(Packet { bytes }))
    }

    /// `r`からTSパケットを順次読み込むイテレーターを生成する。
    #[inline]
    #[must_use]
    pub fn iter<R: Read>(r: R) -> Packets<R> {
        Packets { r }
    }

    /// パケットがTSパケットとして成立しているかどうかを返す。
    ///
    /// 同期バイト・PID・各制御フィールドに明らかな異常がないことだけを確かめる。
    pub fn is_valid(&self) -> bool {
        if self.sync_byte() != SYNC_BYTE || self.transport_error() {
            return false;
        }
        // 0x0002〜0x000Fは未割り当てのPID
        if matches!(self.pid().get(), 0x0002..=0x000F) {
            return false;
        }
        // スクランブル制御の0b01は予約値
        if self.scrambling_control() == 0b01 {
            return false;
        }
        match self.adaptation_control() {
            // アダプテーションフィールドもペイロードもないパケットは不正
            0b00 => false,
            0b10 => self.bytes[4] <= 183,
            0b11 => self.bytes[4] <= 182,
            _ => true,
        }
    }

    /// 同期バイトを返す。
    #[inline]
    pub fn sync_byte(&self) -> u8 {
        self.bytes[0]
    }

    /// transport error indicatorが立っているかどうかを返す。
    #[inline]
    pub fn transport_error(&self) -> bool {
        self.bytes[1] & 0x80 != 0
    }

    /// payload unit start indicatorが立っているかどうかを返す。
    #[inline]
    pub fn unit_start(&self) -> bool {
        self.bytes[1] & 0x40 != 0
    }

    /// PID（13ビット）を返す。
    #[inline]
    pub fn pid(&self) -> Pid {
        Pid::read(&self.bytes[1..3])
    }

    /// transport scrambling control（2ビット）を返す。
    #[inline]
    pub fn scrambling_control(&self) -> u8 {
        self.bytes[3] >> 6
    }

    /// continuity counter（4ビット）を返す。
    #[inline]
    pub fn continuity_counter(&self) -> u8 {
        self.bytes[3] & 0x0F
    }

    #[inline]
    fn adaptation_control(&self) -> u8 {
        (self.bytes[3] >> 4) & 0b11
    }

    /// アダプテーションフィールドを含むかどうかを返す。
    #[inline]
    pub fn has_adaptation_field(&self) -> bool {
        self.adaptation_control() & 0b10 != 0
    }

    /// ペイロードを含むかどうかを返す。
    #[inline]
    pub fn has_payload(&self) -> bool {
        self.adaptation_control() & 0b01 != 0
    }

    fn adaptation_len(&self) -> Option<u8> {
        self.has_adaptation_field().then(|| self.bytes[4])
    }

    /// アダプテーションフィールドを返す。
    pub fn adaptation_field(&self) -> Option<AdaptationField> {
        let len = self.adaptation_len()? as usize;
        let field = self.bytes.get(5..5 + len)?;
        Some(AdaptationField::read(field))
    }

    /// アダプテーションフィールドに含まれるPCRを返す。
    #[inline]
    pub fn pcr(&self) -> Option<Pcr> {
        self.adaptation_field()?.pcr
    }

    /// ペイロードを返す。ペイロードを含まないパケットでは`None`を返す。
    pub fn payload(&self) -> Option<&[u8]> {
        if !self.has_payload() {
            return None;
        }
        let offset = match self.adaptation_len() {
            Some(len) => 4 + 1 + len as usize,
            None => 4,
        };
        self.bytes.get(offset..)
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Packet {{ pid: {:?}, unit_start: {}, adaptation_control: {:02b}, cc: {} }}",
            self.pid(),
            self.unit_start(),
            self.adaptation_control(),
            self.continuity_counter(),
        )
    }
}

/// Program Clock Reference。
///
/// 90kHzの`base`（33ビット）と27MHzの`extension`（9ビット）の組。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pcr {
    /// 90kHzで数えられる部分。
    pub base: u64,
    /// 27MHzで数えられる部分（0〜299）。
    pub extension: u16,
}

impl Pcr {
    /// `base`と`extension`から`Pcr`を生成する。
    #[inline]
    pub fn new(base: u64, extension: u16) -> Pcr {
        Pcr { base, extension }
    }

    /// 6バイトのPCRフィールドを読み取る。
    fn read(data: &[u8]) -> Pcr {
        let base = ((data[..4].read_be_32() as u64) << 1) | (data[4] >> 7) as u64;
        let extension = data[4..6].read_be_16() & 0x01FF;
        Pcr { base, extension }
    }

    /// `base`と`extension`を合成した27MHzのティック数を返す。
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.base * 300 + self.extension as u64
    }
}

/// TSパケットのアダプテーションフィールド。
///
/// 不連続指示・ランダムアクセス指示・PCRより後のフィールドは読み取らない。
#[derive(Debug, Clone)]
pub struct AdaptationField {
    /// discontinuity indicator
    pub discontinuity_indicator: bool,

    /// random access indicator
    pub random_access_indicator: bool,

    /// program clock reference
    pub pcr: Option<Pcr>,
}

impl AdaptationField {
    /// 長さバイトを除いたアダプテーションフィールドを読み取る。
    ///
    /// 長さ0のフィールドはすべての指示が立っていないものとして扱う。
    fn read(field: &[u8]) -> AdaptationField {
        let flags = field.first().copied().unwrap_or(0);
        let pcr = (flags & 0x10 != 0)
            .then(|| field.get(1..7))
            .flatten()
            .map(Pcr::read);

        AdaptationField {
            discontinuity_indicator: flags & 0x80 != 0,
            random_access_indicator: flags & 0x40 != 0,
            pcr,
        }
    }
}

/// TSパケットを順次読み込むイテレーター。
#[derive(Debug)]
pub struct Packets<R> {
    r: R,
}

impl<R: Read> Iterator for Packets<R> {
    type Item = io::Result<Packet>;

    fn next(&mut self) -> Option<Self::Item> {
        Packet::read(&mut self.r).transpose()
    }
}
