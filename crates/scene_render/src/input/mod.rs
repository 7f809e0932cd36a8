//! Input: mouse state and picking

pub mod picking;

pub use picking::{HitTester, MouseState};
