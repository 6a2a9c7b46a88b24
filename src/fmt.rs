//! Logging macros shared by the whole crate.
//!
//! On the board these are the `defmt` macros. With the `host` feature they forward to the `log`
//! facade, so host tests link without a defmt transport. Arguments must format under both
//! (integers, `&str`, and types implementing both `Display` and `defmt::Format`).

#[cfg(not(feature = "host"))]
pub(crate) use defmt::{debug, info, warn};

#[cfg(feature = "host")]
pub(crate) use log::{debug, info, warn};
