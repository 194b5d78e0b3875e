//! Shared bot state: collaborators, notification target and per-chat modes.

use std::collections::HashMap;
use std::sync::Arc;

use common::{BotConfig, LedgerSource, OrderSource, ProductCatalog};
use teloxide::types::ChatId;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::journal::SharedJournal;
use crate::notifier::Notifier;
use crate::plan_store::SharedPlanStore;
use crate::scheduler::{ActivityGuard, LocalFrame};

/// What a plain text message from a chat means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatMode {
    #[default]
    Menu,
    /// Text is an offer id or SKU to look up.
    ProductLookup,
}

/// External systems the bot talks to.
pub struct Collaborators {
    pub orders: Arc<dyn OrderSource>,
    pub ledger: Arc<dyn LedgerSource>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct BotContext {
    pub config: BotConfig,
    pub frame: LocalFrame,
    pub orders: Arc<dyn OrderSource>,
    pub ledger: Arc<dyn LedgerSource>,
    pub catalog: Arc<dyn ProductCatalog>,
    pub notifier: Arc<dyn Notifier>,
    pub plans: SharedPlanStore,
    pub journal: SharedJournal,
    /// Digest runs, timer-driven or on demand, never overlap.
    pub digest_guard: ActivityGuard,
    target: RwLock<Option<ChatId>>,
    modes: Mutex<HashMap<ChatId, ChatMode>>,
}

impl BotContext {
    pub fn new(
        config: BotConfig,
        frame: LocalFrame,
        collaborators: Collaborators,
        plans: SharedPlanStore,
        journal: SharedJournal,
    ) -> Self {
        Self {
            config,
            frame,
            orders: collaborators.orders,
            ledger: collaborators.ledger,
            catalog: collaborators.catalog,
            notifier: collaborators.notifier,
            plans,
            journal,
            digest_guard: ActivityGuard::new(),
            target: RwLock::new(None),
            modes: Mutex::new(HashMap::new()),
        }
    }

    /// Any chat is allowed when the allow-list is empty.
    pub fn is_authorized(&self, chat: ChatId) -> bool {
        self.config.allowed_chat_ids.is_empty() || self.config.allowed_chat_ids.contains(&chat.0)
    }

    /// Chat that receives order pushes and the daily digest.
    pub async fn target(&self) -> Option<ChatId> {
        *self.target.read().await
    }

    pub async fn set_target(&self, chat: ChatId) {
        let mut target = self.target.write().await;
        if *target != Some(chat) {
            info!("Notification target set to chat {}", chat.0);
        }
        *target = Some(chat);
    }

    pub async fn mode(&self, chat: ChatId) -> ChatMode {
        self.modes.lock().await.get(&chat).copied().unwrap_or_default()
    }

    pub async fn set_mode(&self, chat: ChatId, mode: ChatMode) {
        let mut modes = self.modes.lock().await;
        match mode {
            ChatMode::Menu => {
                modes.remove(&chat);
            }
            other => {
                modes.insert(chat, other);
            }
        }
    }
}
