//! extensions
//!
//! Built-in dependency handlers.
//!
//! - [`ConstExtension`]: `const!KEY` resolves to a fixed value
//! - [`TextExtension`]: `text!NAME` resolves to inline text or fetched data
//!
//! Register them under any prefix with `Container::register_extension`.

pub mod constant;
pub mod text;

pub use constant::ConstExtension;
pub use text::TextExtension;
