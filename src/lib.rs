#![warn(clippy::all)]
#![doc = include_str!("../README.md")]

// Modules that make up the Backlog View library.
mod args;
mod chart;
mod container;
mod error;
mod filter;
mod forecast;
mod layout;
mod link;
mod loader;
mod mapper;
mod traits;

// Publicly expose the contents of these modules.
pub use self::{
    // add to lib
    args::Arguments,
    chart::*,
    container::*,
    error::*,
    filter::*,
    forecast::*,
    layout::*,
    link::*,
    loader::*,
    mapper::*,
    traits::*,
};

// https://crates.io/crates/cfg-if
cfg_if::cfg_if! {
    // Quarter-column detection rule for the planning workbook.
    // The permissive rule keeps any column whose name contains a 'Q'.
    if #[cfg(feature = "quarter-strict")] {
        mod quarter_rule_v2;
        pub use quarter_rule_v2::*;
    } else {
        // default: "permissive"
        mod quarter_rule_v1;
        pub use quarter_rule_v1::*;
    }
}
