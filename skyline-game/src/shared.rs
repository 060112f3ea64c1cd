//! Multi-threaded host wrapper.
//!
//! One mutex serializes every command, and the flash-sale auto close runs
//! as a fire-once Tokio task that is aborted when the sale closes early.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;

use crate::error::GameResult;
use crate::flash_sale::{FlashSalePurchase, FlashSaleStart, FlashSaleSummary};
use crate::player::PlayerId;
use crate::session::GameSession;

#[derive(Debug, Default)]
struct SaleTimer {
    sale_id: u64,
    handle: Option<JoinHandle<()>>,
}

impl SaleTimer {
    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("flash sale {} timer cancelled", self.sale_id);
            handle.abort();
        }
    }
}

#[derive(Debug, Clone)]
pub struct SharedSession {
    session: Arc<Mutex<GameSession>>,
    timer: Arc<Mutex<SaleTimer>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SharedSession {
    #[must_use]
    pub fn new(session: GameSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            timer: Arc::new(Mutex::new(SaleTimer::default())),
        }
    }

    /// Run one command under the session lock. A sale closed by the
    /// command also cancels its timer.
    pub fn with<R>(&self, f: impl FnOnce(&mut GameSession) -> R) -> R {
        let mut session = lock(&self.session);
        let out = f(&mut session);
        if session.flash_sale.active().is_none() {
            lock(&self.timer).cancel();
        }
        out
    }

    /// Open a sale and schedule its close. Must be called inside a Tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Same as [`GameSession::start_flash_sale`].
    pub fn start_flash_sale(
        &self,
        building_id: &str,
        sale_price: i64,
        quantity: u32,
        duration_secs: Option<u64>,
    ) -> GameResult<FlashSaleStart> {
        let mut session = lock(&self.session);
        let start = session.start_flash_sale(building_id, sale_price, quantity, duration_secs)?;
        let delay = Duration::from_millis(start.schedule.due_at_ms.saturating_sub(session.now_ms()));
        let sale_id = start.schedule.sale_id;

        let shared = Arc::clone(&self.session);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if lock(&shared).expire_flash_sale(sale_id).is_some() {
                debug!("flash sale {sale_id} closed by timer");
            }
        });

        let mut timer = lock(&self.timer);
        timer.cancel();
        timer.sale_id = sale_id;
        timer.handle = Some(handle);
        Ok(start)
    }

    /// # Errors
    ///
    /// Same as [`GameSession::buy_flash_sale`].
    pub fn buy_flash_sale(&self, player_id: &PlayerId) -> GameResult<FlashSalePurchase> {
        self.with(|session| session.buy_flash_sale(player_id))
    }

    pub fn close_flash_sale(&self) -> Option<FlashSaleSummary> {
        self.with(GameSession::close_flash_sale)
    }

    /// Whether an auto-close task is still waiting to fire.
    #[must_use]
    pub fn timer_pending(&self) -> bool {
        lock(&self.timer)
            .handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
