//! Helper functions shared by the renderer, templates and handlers

mod date;
mod html;
mod meta;
mod url;

pub use date::*;
pub use html::*;
pub use meta::*;
pub use self::url::*;
