#![allow(clippy::let_and_return)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]

// #![warn(clippy::cast_possible_truncation)]
// #![warn(clippy::cast_sign_loss)]

pub mod background;
mod crop;
mod error;
pub mod mask;
pub mod moments;

pub use background::{BackgroundModel, BackgroundModelCfg};
pub use crop::Crop;
pub use error::Error;
pub use mask::{is_blank, Kernel};
pub use moments::ContourMoments;
