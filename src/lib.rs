#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! A daily alarm clock engine.
//!
//! [`AlarmClock`] is the front end: it adds, removes and lists alarms and stops
//! the ringing one. A [`Scheduler`] ticks against a [`Clock`] and rings each
//! alarm at most once per calendar day; listeners hear about it through the
//! [`NotificationChannel`].

pub mod alarm;
pub mod audio;
pub mod client;
pub mod clock;
pub mod commands;
pub mod communication;
pub mod config;
pub mod error;
pub mod protocol;
pub mod scheduler;
pub mod server;
pub mod store;

pub use alarm::{Alarm, AlarmId, AlarmView};
pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::AlarmClock;
pub use communication::{Event, NotificationChannel, Subscription};
pub use error::{Error, Result};
pub use scheduler::{Scheduler, SchedulerHandle, TickReport};
pub use store::AlarmStore;
