//! Drude free-electron model.
//!
//! Models are implemented as small, pure functions so that fitting code can
//! stay generic over which permittivity component it targets.

pub mod drude;
pub mod equations;

pub use drude::*;
pub use equations::*;
