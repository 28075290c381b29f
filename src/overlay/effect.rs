//! Single-slot delivery of side-effect requests.
//!
//! Every observer may see the same [`OneShotEffect`], but only the caller
//! whose [`OneShotEffect::consume`] wins is allowed to act on it.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectKind {
    PlaySound,
    RequestHideAfterFade,
    NavigateToPermission,
    RequestRestoreAfterDelay { delay_ms: u64 },
    CancelRestoreDelay,
}

static NEXT_EFFECT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
pub struct OneShotEffect {
    id: u64,
    kind: EffectKind,
    consumed: AtomicBool,
}

impl OneShotEffect {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            id: NEXT_EFFECT_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            consumed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    /// Delay carried by `RequestRestoreAfterDelay`, zero for every other kind.
    pub fn delay_ms(&self) -> u64 {
        match self.kind {
            EffectKind::RequestRestoreAfterDelay { delay_ms } => delay_ms,
            _ => 0,
        }
    }

    /// Returns `true` for exactly one caller over the lifetime of this effect.
    pub fn consume(&self) -> bool {
        self.consumed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::Acquire)
    }
}

impl PartialEq for OneShotEffect {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OneShotEffect {}

/// At most one pending effect. Publishing overwrites an unconsumed effect;
/// the replaced one is dropped without being delivered again.
#[derive(Debug, Default)]
pub struct EffectChannel {
    pending: Option<Arc<OneShotEffect>>,
}

impl EffectChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, kind: EffectKind) -> Arc<OneShotEffect> {
        let effect = Arc::new(OneShotEffect::new(kind));
        if let Some(replaced) = self.pending.replace(effect.clone()) {
            if !replaced.is_consumed() {
                tracing::trace!(id = replaced.id(), kind = ?replaced.kind(), "pending effect overwritten");
            }
        }
        effect
    }

    pub fn current(&self) -> Option<Arc<OneShotEffect>> {
        self.pending.clone()
    }

    pub fn clear(&mut self) {
        self.pending = None;
    }

    /// Clears the slot only if it still holds `effect`. Returns whether it did.
    pub fn clear_if_current(&mut self, effect: &Arc<OneShotEffect>) -> bool {
        match &self.pending {
            Some(pending) if Arc::ptr_eq(pending, effect) => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }
}
