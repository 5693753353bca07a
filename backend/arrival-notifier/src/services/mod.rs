pub mod arrival_message;
pub mod arrival_notifier;
pub mod document_store;
pub mod push_transport;

pub use arrival_message::*;
pub use arrival_notifier::*;
pub use document_store::*;
pub use push_transport::*;
