pub mod adjuster;

pub use adjuster::{next_price, validate};
