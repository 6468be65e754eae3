pub mod event_logging;
pub mod net_counters;
pub mod pwm;
