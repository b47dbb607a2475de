pub mod alert;
pub mod alert_feedback;
pub mod backfill_checkpoint;
pub mod connected_account;
pub mod dead_letter;
pub mod event;
pub mod notification_item;
pub mod rule_set;
