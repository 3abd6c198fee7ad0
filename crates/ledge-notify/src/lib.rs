pub mod dispatcher;
pub mod log;
pub mod render;
pub mod sink;

pub use dispatcher::start_dispatcher;
pub use log::LogSink;
pub use render::{render_message, Locale};
pub use sink::{AlertNotification, DispatchOutcome, NotificationSink};
