mod server;

pub use server::{handle_message, run};
