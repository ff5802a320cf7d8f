pub mod membership;
pub mod messages;
pub mod notify;
pub mod presence;
pub mod router;

pub use membership::MembershipStore;
pub use messages::MessageStore;
pub use presence::PresenceTracker;
