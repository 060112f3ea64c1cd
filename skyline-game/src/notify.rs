//! Structured notifications emitted by session operations.
//!
//! The session appends to an [`Outbox`]; the host drains it and fans the
//! envelopes out over whatever transport it uses.

use serde::{Deserialize, Serialize};

use crate::flash_sale::FlashSaleSummary;
use crate::goals::GoalProgress;
use crate::mini_events::MiniEventResult;
use crate::player::PlayerId;
use crate::roles::RoleId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    PlayerJoined {
        player_id: PlayerId,
        name: String,
        role: RoleId,
    },
    RoleAssigned {
        player_id: PlayerId,
        role: RoleId,
    },
    GameStarted {
        player_count: usize,
    },
    BuildingPhaseStarted,
    EventTriggered {
        event_id: String,
        title: String,
    },
    GameEnded {
        total_buildings: u32,
    },
    GameReset,
    BuildingPurchased {
        player_id: PlayerId,
        building_id: String,
        cost: i64,
    },
    BuildingUpgraded {
        player_id: PlayerId,
        from: String,
        to: String,
        merge_count: u32,
        bonus_score: i64,
    },
    ItemPurchased {
        player_id: PlayerId,
        item_id: String,
    },
    ItemUsed {
        player_id: PlayerId,
        item_id: String,
    },
    ItemDropped {
        player_id: PlayerId,
        item_id: String,
    },
    ItemReceived {
        player_id: PlayerId,
        item_id: String,
        reason: String,
    },
    MiniEventTriggered {
        player_id: PlayerId,
        event_id: String,
        result: MiniEventResult,
    },
    AchievementUnlocked {
        player_id: PlayerId,
        achievement_id: String,
        global_first: bool,
    },
    CityGoalActivated {
        goal_id: String,
    },
    CityGoalDeactivated {
        goal_id: String,
    },
    CityGoalCompleted {
        goal_id: String,
        progress: GoalProgress,
    },
    FlashSaleStarted {
        sale_id: u64,
        building_id: String,
        sale_price: i64,
        quantity: u32,
        ends_at_ms: u64,
        discount_pct: i64,
    },
    FlashSalePurchased {
        sale_id: u64,
        player_id: PlayerId,
        remaining: u32,
    },
    FlashSaleEnded {
        summary: FlashSaleSummary,
    },
    ScoreAdded {
        player_id: PlayerId,
        amount: i64,
        reason: String,
    },
    CoinsAdded {
        player_id: PlayerId,
        amount: i64,
        reason: String,
    },
}

/// A notification stamped with its position in the session stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    pub at_ms: u64,
    pub notification: Notification,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outbox {
    next_seq: u64,
    pending: Vec<Envelope>,
}

impl Outbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, notification: Notification, at_ms: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Envelope {
            seq,
            at_ms,
            notification,
        });
    }

    /// Take every pending envelope in emission order.
    pub fn drain(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.pending)
    }

    #[must_use]
    pub fn pending(&self) -> &[Envelope] {
        &self.pending
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
