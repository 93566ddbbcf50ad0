pub mod job_client;
pub mod materializer;
pub mod warn_writer;

pub use job_client::JobClient;
pub use materializer::{materialize, merge};
pub use warn_writer::WarnWriter;
