pub mod bitrate;
pub mod control_event;
pub mod counter_snapshot;
pub mod duty_cycle;
pub mod pwm_pin;
