//! MPEG2-TSにおける日付時刻。
//!
//! EITなどのSIが運ぶ時刻は修正ユリウス日とBCDの時分秒の組であり、
//! 日本標準時で表される。

use std::fmt::{self, Write};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::utils::BytesExt;

/// 修正ユリウス日におけるUNIXエポック。
const UNIX_EPOCH_MJD: i64 = 40587;

/// 日本標準時とUTCの時差（秒）。
const JST_OFFSET_SECS: i64 = 9 * 60 * 60;

fn write_hundreds<W: Write>(w: &mut W, n: u8) -> fmt::Result {
    let h = b'0' + n / 10;
    let l = b'0' + n % 10;
    w.write_char(h as char)?;
    w.write_char(l as char)
}

/// 修正ユリウス日。
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MjdDate(pub u16);

impl MjdDate {
    /// `data`から`MjdDate`を読み取る。
    #[inline]
    pub fn read(data: &[u8; 2]) -> MjdDate {
        MjdDate(data.read_be_16())
    }

    /// 年月日に変換する。
    pub fn to_ymd(&self) -> (i32, u8, u8) {
        let mjd = self.0;
        let yd = ((mjd as f32 - 15078.2) / 365.25) as u16;
        let md = ((mjd as f32 - 14956.1 - (yd as f32 * 365.25) as u16 as f32) / 30.6001) as u8;

        let day = (mjd - 14956 - (yd as f32 * 365.25) as u16 - (md as f32 * 30.6001) as u16) as u8;
        let (year, month) = if md == 14 || md == 15 {
            (yd + 1, md - 1 - 12)
        } else {
            (yd, md - 1)
        };

        (1900 + year as i32, month, day)
    }
}

impl fmt::Debug for MjdDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (year, month, day) = self.to_ymd();

        fmt::Display::fmt(&year, f)?;
        f.write_char('-')?;
        write_hundreds(f, month)?;
        f.write_char('-')?;
        write_hundreds(f, day)
    }
}

impl fmt::Display for MjdDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 修正ユリウス日と日本標準時からなる日付時刻。
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateTime {
    /// 修正ユリウス日。
    pub date: MjdDate,
    /// 時（0～23）。
    pub hour: u8,
    /// 分（0～59）。
    pub minute: u8,
    /// 秒（0～60）。
    pub second: u8,
}

impl DateTime {
    /// `data`から`DateTime`を読み取る。
    pub fn read(data: &[u8; 5]) -> DateTime {
        let date = MjdDate::read(&data[0..=1].try_into().unwrap());

        let hour = crate::utils::read_bcd_digit(data[2]);
        let minute = crate::utils::read_bcd_digit(data[3]);
        let second = crate::utils::read_bcd_digit(data[4]);

        DateTime {
            date,
            hour,
            minute,
            second,
        }
    }

    /// 日本標準時の壁時計としての[`NaiveDateTime`]に変換する。
    ///
    /// 日付や時刻が範囲外の場合は`None`を返す。
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        let (year, month, day) = self.date.to_ymd();
        let date = NaiveDate::from_ymd_opt(year, month as u32, day as u32)?;
        let time =
            NaiveTime::from_hms_opt(self.hour as u32, self.minute as u32, self.second as u32)?;
        Some(NaiveDateTime::new(date, time))
    }

    /// UNIXエポックからのミリ秒（UTC）に変換する。
    pub fn unix_millis(&self) -> i64 {
        let days = self.date.0 as i64 - UNIX_EPOCH_MJD;
        let hours = days * 24 + self.hour as i64;
        let minutes = hours * 60 + self.minute as i64;
        let seconds = minutes * 60 + self.second as i64;
        (seconds - JST_OFFSET_SECS) * 1_000
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.date.fmt(f)?;
        f.write_char(' ')?;

        write_hundreds(f, self.hour)?;
        f.write_char(':')?;
        write_hundreds(f, self.minute)?;
        f.write_char(':')?;
        write_hundreds(f, self.second)
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
