//! PSI/SIセクションの読み取り。
//!
//! セクションの枠組みだけをここで扱い、中身の解釈は[`table`]の各デコーダーが行う。

pub mod table;

use crc::{Crc, CRC_32_MPEG_2};
use fxhash::FxHashMap;
use thiserror::Error;

use crate::utils::BytesExt;

/// セクションの末尾に付くCRC32の長さ。
const CRC_LEN: usize = 4;

/// 拡張ヘッダー（セクションシンタクス）の長さ。
const EXT_HEADER_LEN: usize = 5;

/// スタッフィングを表すテーブル識別。
const STUFFING_TABLE_ID: u8 = 0xFF;

/// CRC-32/MPEG-2。CRCを含むセクション全体の検査値が0になる性質で照合する。
const SECTION_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// [`Section::read`]で発生するエラー。
///
/// 長さが確定しているセクションで発生したエラーには、
/// 読み飛ばすべきバイト数としてセクション長が付随する。
#[derive(Debug, Error)]
pub enum SectionError {
    /// バッファにセクション全体がまだ揃っていない。
    #[error("section is not complete yet")]
    Incomplete,

    /// スタッフィングバイトに到達し、後続のセクションはない。
    #[error("reached stuffing bytes")]
    Stuffing,

    /// セクションとして成立しない長さである。
    #[error("malformed section of {0} bytes")]
    Malformed(usize),

    /// CRC32の照合に失敗した。
    #[error("crc mismatch in a section of {0} bytes")]
    BadCrc(usize),
}

/// 長さとCRCを検証済みのPSI/SIセクション。
#[derive(Debug)]
pub struct Section<'a> {
    /// テーブル識別。
    pub table_id: u8,
    /// 拡張ヘッダー。セクションシンタクス指示のないセクションでは`None`。
    pub header: Option<ExtendedHeader>,
    /// ヘッダーとCRCを除いた本体。
    pub payload: &'a [u8],
}

/// セクションシンタクス指示が立っているセクションの拡張ヘッダー。
#[derive(Debug)]
pub struct ExtendedHeader {
    /// テーブル識別拡張。PAT・PMT・EITではそれぞれ
    /// TS識別・サービス識別・サービス識別が入る。
    pub table_id_extension: u16,
    /// バージョン番号（5ビット）。
    pub version: u8,
    /// カレントネクスト指示。
    pub current: bool,
    /// セクション番号。
    pub section_number: u8,
    /// 最終セクション番号。
    pub last_section_number: u8,
}

impl<'a> Section<'a> {
    /// `buf`の先頭からセクションを1つ読み取り、セクションと消費バイト数を返す。
    pub fn read(buf: &'a [u8]) -> Result<(Section<'a>, usize), SectionError> {
        let [table_id, hi, lo, ..] = *buf else {
            return Err(SectionError::Incomplete);
        };
        if table_id == STUFFING_TABLE_ID {
            return Err(SectionError::Stuffing);
        }

        let body_len = (u16::from_be_bytes([hi, lo]) & 0x0FFF) as usize;
        let total = 3 + body_len;
        let Some(section) = buf.get(..total) else {
            return Err(SectionError::Incomplete);
        };

        let has_ext_header = hi & 0x80 != 0;
        let min = CRC_LEN + if has_ext_header { EXT_HEADER_LEN } else { 0 };
        if body_len < min {
            return Err(SectionError::Malformed(total));
        }
        if SECTION_CRC.checksum(section) != 0 {
            return Err(SectionError::BadCrc(total));
        }

        let mut payload = &section[3..total - CRC_LEN];
        let header = if has_ext_header {
            let header = ExtendedHeader {
                table_id_extension: payload[..2].read_be_16(),
                version: (payload[2] >> 1) & 0x1F,
                current: payload[2] & 1 != 0,
                section_number: payload[3],
                last_section_number: payload[4],
            };
            payload = &payload[EXT_HEADER_LEN..];
            Some(header)
        } else {
            None
        };

        Ok((
            Section {
                table_id,
                header,
                payload,
            },
            total,
        ))
    }
}

/// セクションから読み取れるテーブル。
pub trait FromSection<'a>: Sized {
    /// `section`からテーブルを読み取る。
    fn from_section(section: &Section<'a>) -> Option<Self>;
}

/// サブテーブルのバージョンを記録し、更新のあったセクションだけを通すフィルター。
///
/// EIT［現在／次］のように周期的に再送されるテーブルを、
/// バージョンが変わったときにだけ読み取るために使う。
#[derive(Debug, Default)]
pub struct VersionTracker {
    // (テーブル識別, テーブル識別拡張, セクション番号) → 最後に見たバージョン番号
    seen: FxHashMap<(u8, u16, u8), u8>,
}

impl VersionTracker {
    /// 空の`VersionTracker`を生成する。
    #[inline]
    pub fn new() -> VersionTracker {
        VersionTracker::default()
    }

    /// `section`が未読み取りのバージョンであれば`T`として読み取る。
    ///
    /// 既に見たバージョンのセクションでは`None`を返す。
    /// 拡張ヘッダーを持たないセクションはバージョン管理の対象外として常に読み取る。
    /// `T`として読み取れない場合も`None`を返す。
    pub fn read<'a, T: FromSection<'a>>(&mut self, section: &Section<'a>) -> Option<T> {
        if let Some(header) = &section.header {
            if header.section_number > header.last_section_number {
                return None;
            }

            let key = (
                section.table_id,
                header.table_id_extension,
                header.section_number,
            );
            if self.seen.insert(key, header.version) == Some(header.version) {
                return None;
            }
        }

        T::from_section(section)
    }
}
