//! Tandem Core - Reconciliation and usage accounting engine
//!
//! The heart of the control plane:
//! - [`ReconcilerService`] merges per-panel records into one combined
//!   subscriber view and carries the cross-panel provisioning operations.
//! - [`UsageService`] turns the append-only snapshot history into daily and
//!   trailing-window usage figures.
//! - [`WarningService`], [`ReportService`] and [`GiftService`] implement the
//!   notification-producing jobs, all dispatching through the [`Notifier`]
//!   trait so message rendering stays out of this crate.
//! - [`Scheduler`] drives the recurring jobs on their cadences.
//!
//! Everything is constructed once at process start and handed around
//! explicitly; there is no global state.

pub mod config;
pub mod error;
pub mod gifts;
pub mod notify;
pub mod reconciler;
pub mod reports;
pub mod scheduler;
pub mod usage;
pub mod warnings;

pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use gifts::GiftService;
pub use notify::{Notice, Notifier, NotifyError};
pub use reconciler::ReconcilerService;
pub use reports::{AccountReport, AdminReport, ReportService, SubscriberReport};
pub use scheduler::Scheduler;
pub use usage::{UsageService, TRAILING_WINDOW_HOURS};
pub use warnings::WarningService;
