//! HTTP handlers

mod health;
mod subscribers;
mod usage;
mod users;

pub use health::{health, ready};
pub use subscribers::{
    create_subscriber, list_latest_payments, list_payments, record_payment, register_account,
    set_birthday, update_setting,
};
pub use usage::{daily_usage, windowed_usage};
pub use users::{
    delete_user, get_user, list_users, modify_user, reload_identity_map, reset_usage, search_users,
};
