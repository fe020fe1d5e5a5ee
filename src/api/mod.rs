pub mod client;
pub mod events;
pub mod logging;
pub mod mock_client;
pub mod stream;

pub use client::{AssistantsClient, FileContent, RunTransport};
pub use events::{event_stream, ByteStream, EventAccumulator, EventStream};
pub use mock_client::{MockTransport, RecordedCall};
