/* demo/standalone/server-rust/src/widgets/mod.rs */

pub mod account;
pub mod guestbook;
pub mod remote;
