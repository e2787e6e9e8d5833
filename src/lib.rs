pub mod calibration;
pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod messages;
pub mod motor;
pub mod runtime;
