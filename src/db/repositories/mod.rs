mod daily_summary;
mod notifications;
mod state_log;
