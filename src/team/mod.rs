//! Teams and file sharing for Dropgate.
//!
//! A file shared to a team is accessible to every current member of that
//! team without transferring ownership.

mod access;
mod repository;
mod types;

pub use access::TeamAccessResolver;
pub use repository::TeamRepository;
pub use types::{Team, TeamMember, TeamRole, TeamShare};
