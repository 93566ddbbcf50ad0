pub mod poll_scheduler;

pub use poll_scheduler::{PollCallback, PollEvent, PollScheduler, PollStateHandle};
