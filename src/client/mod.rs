//! CLI chat client: session loop, reconnection, display formatting.

mod error;
mod formatter;
mod runner;
mod session;
mod view;

pub use error::ClientError;
pub use formatter::MessageFormatter;
pub use runner::run_client;
pub use session::run_client_session;
pub use view::ChatView;
