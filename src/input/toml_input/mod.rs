#[cfg(feature = "lettre")]
mod mail;
mod settings;

#[cfg(feature = "lettre")]
pub use mail::*;
pub use settings::*;
