//! Domain models

pub mod email;
pub mod notification;

pub use email::*;
pub use notification::*;
