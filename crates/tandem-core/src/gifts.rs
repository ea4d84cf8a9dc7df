//! Birthday gift disbursement
//!
//! Once per day, every subscriber whose birthday falls on the local date
//! gets the configured quota/expiry gift applied to each of their active
//! accounts. At-most-once is guaranteed by the daily cadence: the scheduler
//! runs this job a single time per local date.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};

use tandem_db::{AccountRepository, Repositories, SubscriberRepository};
use tandem_types::{SubscriberId, SubscriberKey};

use crate::config::CoreConfig;
use crate::error::CoreResult;
use crate::notify::{Notice, Notifier};
use crate::reconciler::ReconcilerService;

/// Applies birthday gifts through the reconciler.
pub struct GiftService {
    repos: Repositories,
    reconciler: Arc<ReconcilerService>,
    notifier: Arc<dyn Notifier>,
    config: Arc<CoreConfig>,
}

impl GiftService {
    pub fn new(
        repos: Repositories,
        reconciler: Arc<ReconcilerService>,
        notifier: Arc<dyn Notifier>,
        config: Arc<CoreConfig>,
    ) -> Self {
        Self {
            repos,
            reconciler,
            notifier,
            config,
        }
    }

    /// Disburse gifts for everyone whose birthday matches `local_date`.
    ///
    /// Returns the number of subscribers gifted. A failing subscriber is
    /// logged and skipped.
    pub async fn run_for_date(&self, local_date: NaiveDate) -> CoreResult<usize> {
        let celebrants = self
            .repos
            .subscribers
            .with_birthday_on(local_date.month(), local_date.day())
            .await?;
        if celebrants.is_empty() {
            return Ok(0);
        }

        let mut gifted = 0;
        for subscriber in celebrants {
            match self.gift_subscriber(subscriber).await {
                Ok(true) => gifted += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(subscriber = %subscriber, error = %err, "birthday gift failed for subscriber");
                }
            }
        }

        info!(gifted, "birthday gifts disbursed");
        Ok(gifted)
    }

    /// Apply the gift to every account the subscriber owns. The panel "add
    /// quota" call runs exactly once per account; a partially failing
    /// subscriber still gets notified if at least one account was topped up.
    async fn gift_subscriber(&self, subscriber: SubscriberId) -> CoreResult<bool> {
        let accounts = self.repos.accounts.list_for_subscriber(subscriber).await?;
        if accounts.is_empty() {
            return Ok(false);
        }

        let mut any_applied = false;
        for account in accounts {
            let key = match account.uuid() {
                Some(uuid) => SubscriberKey::Uuid(uuid),
                None => match &account.panel_name {
                    Some(name) => SubscriberKey::Name(name.clone()),
                    None => continue,
                },
            };
            match self
                .reconciler
                .modify_user(&key, self.config.birthday_gift, None)
                .await
            {
                Ok(()) => any_applied = true,
                Err(err) => {
                    warn!(account = %account.account_id(), error = %err, "gift application failed for account");
                }
            }
        }

        if any_applied {
            if let Err(err) = self
                .notifier
                .notify_subscriber(
                    subscriber,
                    Notice::BirthdayGift {
                        gift: self.config.birthday_gift,
                    },
                )
                .await
            {
                warn!(subscriber = %subscriber, error = %err, "birthday notice dispatch failed");
            }
        }
        Ok(any_applied)
    }
}
