//! BlackRoad Core - Entity Types
//!
//! Shared data model for the memory store, reasoning engine and coordination
//! bus: identifiers, trinary truth values, capability sets, opaque payload
//! values, the error taxonomy and platform configuration.

mod capability;
mod config;
mod entities;
mod enums;
mod error;
mod events;
mod identity;
mod value;

pub use capability::*;
pub use config::*;
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use events::*;
pub use identity::*;
pub use value::*;
