//! Infrastructure: persistence, events, and the remote platform seam

pub mod database;
pub mod events;
pub mod remote;
