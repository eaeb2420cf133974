//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate the database and the mail collaborator.

mod account;
pub mod forms;
mod graph;
mod password_reset;
mod timeline;

pub use account::{AccountService, avatar_reference};
pub use forms::{PasswordForm, ProfileForm, RegistrationForm};
pub use graph::{FollowCounts, GraphService};
pub use password_reset::PasswordResetService;
pub use timeline::{Page, TimelineService};
