//! EIT［現在／次］による対象イベントの追跡。

use crate::psi::table::{Eit, EitEvent, EventId};

/// EIT［現在／次］のサブテーブルを組み立てるバッファ。
///
/// 現在（セクション0）と次（セクション1）は別セクションとして届くため、
/// 同一バージョンの全セクションが揃った時点でイベント一覧として確定させる。
/// 揃う前の状態で判定すると、現在イベントを欠いた「次」だけの一覧を
/// 「現在」と取り違えることになる。
#[derive(Debug, Default)]
pub struct PfBuffer {
    version: Option<u8>,
    last_section_number: u8,
    slots: [Option<Vec<EitEvent>>; 2],
}

impl PfBuffer {
    /// 空の`PfBuffer`を生成する。
    #[inline]
    pub fn new() -> PfBuffer {
        PfBuffer::default()
    }

    /// `eit`を取り込み、サブテーブルが揃った場合はイベント一覧を返す。
    ///
    /// 一覧は現在・次の順に並び、空のセクションのイベントは現れない。
    /// バージョンが変わると組み立て中の状態は破棄される。
    pub fn update(&mut self, eit: &Eit) -> Option<Vec<EitEvent>> {
        if eit.section_number > 1 {
            log::debug!("invalid EIT p/f section_number: {}", eit.section_number);
            return None;
        }

        if self.version != Some(eit.version_number) {
            self.version = Some(eit.version_number);
            self.slots = [None, None];
        }
        self.last_section_number = eit.last_section_number.min(1);
        self.slots[eit.section_number as usize] = Some(eit.events.clone());

        let complete = self
            .slots
            .iter()
            .take(self.last_section_number as usize + 1)
            .all(Option::is_some);
        complete.then(|| {
            self.slots
                .iter()
                .flatten()
                .flatten()
                .copied()
                .collect::<Vec<_>>()
        })
    }
}

/// 対象イベントのEIT［現在／次］における位置付け。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// 対象イベントが放送中である。
    Present(EitEvent),
    /// 対象イベントが次に放送される。
    Following(EitEvent),
    /// EITにイベントがひとつも存在しない。
    NoEvents,
    /// 現在のイベントのみ存在し、それが対象イベントではない。
    NoFollowing,
    /// 現在・次のいずれも対象イベントではない。
    Unlisted,
}

/// `events`から`eid`のイベントを検索する。
///
/// `events`は[`PfBuffer::update`]が返す一覧で、現在・次の順に並ぶ。
pub fn resolve(events: &[EitEvent], eid: EventId) -> Resolution {
    let Some(present) = events.first() else {
        return Resolution::NoEvents;
    };
    if present.event_id == eid {
        return Resolution::Present(*present);
    }

    let Some(following) = events.get(1) else {
        return Resolution::NoFollowing;
    };
    if following.event_id == eid {
        return Resolution::Following(*following);
    }

    Resolution::Unlisted
}
