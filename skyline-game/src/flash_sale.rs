//! Flash Sale Manager.
//!
//! At most one sale runs at a time. A sale is a limited quantity of one
//! building at a fixed price, open until it sells out, its window passes, or
//! the host closes it. Each player may buy once per sale.

use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::achievements::{AchievementContext, UnlockedAchievement, check_achievements};
use crate::buildings::BuildingDef;
use crate::city::ConstructionKind;
use crate::error::{GameError, GameResult};
use crate::goals::CompletedGoal;
use crate::notify::Notification;
use crate::numbers::{i64_to_f64, round_f64_to_i64};
use crate::player::PlayerId;
use crate::session::GameSession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashSale {
    /// Distinguishes sale instances so stale timers cannot close a newer sale.
    pub sale_id: u64,
    pub building_id: String,
    pub original_price: i64,
    pub sale_price: i64,
    pub quantity: u32,
    pub remaining: u32,
    pub started_at_ms: u64,
    pub ends_at_ms: u64,
    pub buyers: Vec<PlayerId>,
}

impl FlashSale {
    #[must_use]
    pub fn discount_pct(&self) -> i64 {
        discount_pct(self.sale_price, self.original_price)
    }

    #[must_use]
    pub fn has_bought(&self, player: &PlayerId) -> bool {
        self.buyers.contains(player)
    }

    #[must_use]
    pub const fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.ends_at_ms
    }

    #[must_use]
    pub const fn sold(&self) -> u32 {
        self.quantity - self.remaining
    }
}

/// `round((1 - sale / original) * 100)`, or 0 for a free original.
#[must_use]
pub fn discount_pct(sale_price: i64, original_price: i64) -> i64 {
    if original_price == 0 {
        return 0;
    }
    round_f64_to_i64((1.0 - i64_to_f64(sale_price) / i64_to_f64(original_price)) * 100.0)
}

/// When the sale with `sale_id` should be closed automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledClose {
    pub sale_id: u64,
    pub due_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashSaleSummary {
    pub sale_id: u64,
    pub building_id: String,
    pub total_sold: u32,
    pub total_quantity: u32,
    pub buyers: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashSaleStatus {
    pub sale: FlashSale,
    pub time_remaining_ms: u64,
    pub discount_pct: i64,
}

/// A reserved unit of an active sale. Issuing one has already recorded the
/// buyer and decremented the remaining quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SaleTicket {
    pub sale_id: u64,
    pub building_id: String,
    pub price: i64,
    pub original_price: i64,
    pub remaining: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlashSaleManager {
    active: Option<FlashSale>,
    next_sale_id: u64,
}

impl FlashSaleManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn active(&self) -> Option<&FlashSale> {
        self.active.as_ref()
    }

    /// Open a sale. An expired sale still holding stock is closed first and
    /// its summary returned alongside.
    ///
    /// # Errors
    ///
    /// Fails when a live sale still has stock, or for zero quantity or duration.
    pub fn start(
        &mut self,
        building: &BuildingDef,
        sale_price: i64,
        quantity: u32,
        duration_secs: u64,
        now_ms: u64,
    ) -> GameResult<(FlashSale, ScheduledClose, Option<FlashSaleSummary>)> {
        if quantity == 0 {
            return Err(GameError::InvalidSale("quantity must be at least 1"));
        }
        if duration_secs == 0 {
            return Err(GameError::InvalidSale("duration must be at least 1 second"));
        }
        if sale_price < 0 {
            return Err(GameError::InvalidSale("price must not be negative"));
        }
        let live = self
            .active
            .as_ref()
            .is_some_and(|sale| sale.remaining > 0 && !sale.is_expired(now_ms));
        if live {
            return Err(GameError::SaleAlreadyActive);
        }
        let stale = self.close();

        self.next_sale_id += 1;
        let sale = FlashSale {
            sale_id: self.next_sale_id,
            building_id: building.id.clone(),
            original_price: building.cost,
            sale_price,
            quantity,
            remaining: quantity,
            started_at_ms: now_ms,
            ends_at_ms: now_ms.saturating_add(duration_secs.saturating_mul(1_000)),
            buyers: Vec::new(),
        };
        let schedule = ScheduledClose {
            sale_id: sale.sale_id,
            due_at_ms: sale.ends_at_ms,
        };
        info!(
            "flash sale {} started: {} x{} at {}",
            sale.sale_id, sale.building_id, quantity, sale_price
        );
        self.active = Some(sale.clone());
        Ok((sale, schedule, stale))
    }

    /// Check every purchase precondition and, if all pass, record the buyer
    /// and take one unit. Check order: stock, window, repeat buyer, coins.
    pub(crate) fn reserve(
        &mut self,
        player: &PlayerId,
        coins: i64,
        now_ms: u64,
    ) -> GameResult<SaleTicket> {
        let sale = match self.active.as_mut() {
            Some(sale) if sale.remaining > 0 => sale,
            _ => return Err(GameError::SoldOut),
        };
        if sale.is_expired(now_ms) {
            return Err(GameError::SaleExpired);
        }
        if sale.has_bought(player) {
            return Err(GameError::AlreadyPurchased);
        }
        if coins < sale.sale_price {
            return Err(GameError::InsufficientCoins {
                needed: sale.sale_price,
                available: coins,
            });
        }
        sale.buyers.push(player.clone());
        sale.remaining -= 1;
        Ok(SaleTicket {
            sale_id: sale.sale_id,
            building_id: sale.building_id.clone(),
            price: sale.sale_price,
            original_price: sale.original_price,
            remaining: sale.remaining,
        })
    }

    /// Close whatever sale is active.
    pub fn close(&mut self) -> Option<FlashSaleSummary> {
        let sale = self.active.take()?;
        info!(
            "flash sale {} closed: {}/{} sold",
            sale.sale_id,
            sale.sold(),
            sale.quantity
        );
        Some(FlashSaleSummary {
            sale_id: sale.sale_id,
            building_id: sale.building_id.clone(),
            total_sold: sale.sold(),
            total_quantity: sale.quantity,
            buyers: sale.buyers.len(),
        })
    }

    /// Close the sale only if it is still the instance `sale_id`.
    pub fn expire(&mut self, sale_id: u64) -> Option<FlashSaleSummary> {
        if self.active.as_ref().is_some_and(|s| s.sale_id == sale_id) {
            self.close()
        } else {
            None
        }
    }

    /// Close the active sale if its window has passed.
    pub fn poll(&mut self, now_ms: u64) -> Option<FlashSaleSummary> {
        if self.active.as_ref().is_some_and(|s| s.is_expired(now_ms)) {
            self.close()
        } else {
            None
        }
    }

    #[must_use]
    pub fn status(&self, now_ms: u64) -> Option<FlashSaleStatus> {
        self.active.as_ref().map(|sale| FlashSaleStatus {
            sale: sale.clone(),
            time_remaining_ms: sale.ends_at_ms.saturating_sub(now_ms),
            discount_pct: sale.discount_pct(),
        })
    }
}

/// A freshly opened sale and the close the host must schedule for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashSaleStart {
    pub sale: FlashSale,
    pub schedule: ScheduledClose,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlashSalePurchase {
    pub sale_id: u64,
    pub player_id: PlayerId,
    pub building: BuildingDef,
    pub paid_price: i64,
    pub saved_amount: i64,
    pub remaining: u32,
    pub coins_left: i64,
    pub achievements: Vec<UnlockedAchievement>,
    pub completed_goals: Vec<CompletedGoal>,
    /// Set when this purchase took the last unit and closed the sale.
    pub sale_closed: Option<FlashSaleSummary>,
}

impl GameSession {
    /// Open a flash sale. `duration_secs` falls back to the configured
    /// default.
    ///
    /// # Errors
    ///
    /// Rejects sales after the game ended, unknown buildings, invalid
    /// parameters and a live sale that still has stock.
    pub fn start_flash_sale(
        &mut self,
        building_id: &str,
        sale_price: i64,
        quantity: u32,
        duration_secs: Option<u64>,
    ) -> GameResult<FlashSaleStart> {
        self.ensure_not_ended()?;
        let catalog = Arc::clone(&self.catalog);
        let building = catalog
            .building(building_id)
            .ok_or_else(|| GameError::UnknownBuilding(building_id.to_string()))?;
        let duration = duration_secs.unwrap_or(self.config.flash_sale_default_seconds);
        let now = self.now_ms();
        let (sale, schedule, stale) = self
            .flash_sale
            .start(building, sale_price, quantity, duration, now)?;
        if let Some(summary) = stale {
            self.notify(Notification::FlashSaleEnded { summary });
        }
        self.notify(Notification::FlashSaleStarted {
            sale_id: sale.sale_id,
            building_id: sale.building_id.clone(),
            sale_price: sale.sale_price,
            quantity: sale.quantity,
            ends_at_ms: sale.ends_at_ms,
            discount_pct: sale.discount_pct(),
        });
        Ok(FlashSaleStart { sale, schedule })
    }

    /// Buy one unit of the running sale. Taking the last unit closes it.
    ///
    /// # Errors
    ///
    /// Check order: unknown player, no sale or no stock, window passed,
    /// already bought from this sale, insufficient coins.
    pub fn buy_flash_sale(&mut self, player_id: &PlayerId) -> GameResult<FlashSalePurchase> {
        let catalog = Arc::clone(&self.catalog);
        let now = self.now_ms();
        let player = self
            .players
            .get_mut(player_id)
            .ok_or_else(|| GameError::PlayerNotFound(player_id.clone()))?;
        let building = self
            .flash_sale
            .active()
            .and_then(|sale| catalog.building(&sale.building_id))
            .ok_or(GameError::SoldOut)?;
        let ticket = self.flash_sale.reserve(player_id, player.coins, now)?;

        player.coins -= ticket.price;
        self.city
            .record_construction(player, &ticket.building_id, ConstructionKind::FlashSale, now);
        let achievements = check_achievements(
            &catalog,
            &mut self.registry,
            player,
            &self.city,
            AchievementContext::BuildingPurchase {
                building_id: &ticket.building_id,
                cost: ticket.price,
            },
        );
        let coins_left = player.coins;
        info!(
            "{player_id} took flash sale {} unit at {} ({} left)",
            ticket.sale_id, ticket.price, ticket.remaining
        );

        self.notify(Notification::FlashSalePurchased {
            sale_id: ticket.sale_id,
            player_id: player_id.clone(),
            remaining: ticket.remaining,
        });
        self.announce_unlocks(player_id, &achievements);
        let sale_closed = if ticket.remaining == 0 {
            self.close_flash_sale()
        } else {
            None
        };
        let completed_goals = self.check_city_goals();

        Ok(FlashSalePurchase {
            sale_id: ticket.sale_id,
            player_id: player_id.clone(),
            building: building.clone(),
            paid_price: ticket.price,
            saved_amount: ticket.original_price - ticket.price,
            remaining: ticket.remaining,
            coins_left,
            achievements,
            completed_goals,
            sale_closed,
        })
    }

    /// Host close of whatever sale is running.
    pub fn close_flash_sale(&mut self) -> Option<FlashSaleSummary> {
        let summary = self.flash_sale.close()?;
        self.notify(Notification::FlashSaleEnded {
            summary: summary.clone(),
        });
        Some(summary)
    }

    /// Timer callback for the sale scheduled as `sale_id`. A stale id is a
    /// no-op.
    pub fn expire_flash_sale(&mut self, sale_id: u64) -> Option<FlashSaleSummary> {
        let summary = self.flash_sale.expire(sale_id)?;
        debug!("flash sale {sale_id} expired on schedule");
        self.notify(Notification::FlashSaleEnded {
            summary: summary.clone(),
        });
        Some(summary)
    }

    /// Close the running sale if its window has passed.
    pub fn poll_timers(&mut self) -> Option<FlashSaleSummary> {
        let now = self.now_ms();
        let summary = self.flash_sale.poll(now)?;
        self.notify(Notification::FlashSaleEnded {
            summary: summary.clone(),
        });
        Some(summary)
    }

    #[must_use]
    pub fn flash_sale_status(&self) -> Option<FlashSaleStatus> {
        self.flash_sale.status(self.now_ms())
    }
}
