pub mod control;
pub mod health;
pub mod mqtt;
pub mod protocol;
pub mod state;
pub mod transport;
