mod history;
mod key;
mod subscriber;

pub use history::*;
pub use key::*;
pub use subscriber::*;
