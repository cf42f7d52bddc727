//! Business services: formatting, composition and dispatch

pub mod composer;
pub mod dispatcher;
pub mod duration;

pub use composer::ContentComposer;
pub use dispatcher::Dispatcher;
pub use duration::{format_datetime, format_expiry, DurationBreakdown, FormattedExpiry};
