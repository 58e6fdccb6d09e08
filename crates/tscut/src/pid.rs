//! PID関連。

use std::fmt;

/// MPEG2-TSのPID（13ビット）。
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Pid(u16);

impl Pid {
    /// PIDの最大値。
    pub const MAX: u16 = 0x1FFF;

    /// Program Association Table
    pub const PAT: Pid = Pid::new(0x0000);
    /// Conditional Access Table
    pub const CAT: Pid = Pid::new(0x0001);
    /// Network Information Table
    pub const NIT: Pid = Pid::new(0x0010);
    /// Service Description Table
    pub const SDT: Pid = Pid::new(0x0011);
    /// Event Information Table
    pub const EIT: Pid = Pid::new(0x0012);
    /// Time and Date Table
    pub const TDT: Pid = Pid::new(0x0014);
    /// Null packet
    pub const NULL: Pid = Pid::new(0x1FFF);

    /// `Pid`を生成する。
    ///
    /// # パニック
    ///
    /// `pid`の値が範囲外の際はパニックする。
    #[inline]
    pub const fn new(pid: u16) -> Pid {
        assert!(pid <= Pid::MAX);
        Pid(pid)
    }

    /// `pid`がPIDとして範囲内であれば`Pid`を生成する。
    #[inline]
    pub const fn new_checked(pid: u16) -> Option<Pid> {
        if pid > Pid::MAX {
            None
        } else {
            Some(Pid(pid))
        }
    }

    /// `data`からPIDを読み出す。
    ///
    /// # パニック
    ///
    /// `data`の長さが2未満の場合、このメソッドはパニックする。
    #[inline]
    pub fn read(data: &[u8]) -> Pid {
        Pid(crate::utils::BytesExt::read_be_16(data) & 0x1FFF)
    }

    /// PIDを`u16`で返す。
    #[inline]
    pub const fn get(&self) -> u16 {
        self.0
    }
}

impl Default for Pid {
    fn default() -> Self {
        Pid::NULL
    }
}

impl From<Pid> for u16 {
    fn from(value: Pid) -> Self {
        value.get()
    }
}

impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pid(0x{:04X})", self.0)
    }
}

macro_rules! pid_delegate_fmt {
    ($($trait:path,)*) => {
        $(
            impl $trait for Pid {
                fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                    self.0.fmt(f)
                }
            }
        )*
    };
}

pid_delegate_fmt!(fmt::Display, fmt::LowerHex, fmt::UpperHex,);
