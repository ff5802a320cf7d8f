pub mod events;
pub mod frame;
pub mod gateway;
pub mod handler;
pub mod session;
