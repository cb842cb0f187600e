//! Pure build-loop logic: step and status types, command resolution and
//! report rendering. Nothing here touches the filesystem or spawns processes.

pub mod report;
pub mod resolver;
pub mod types;
