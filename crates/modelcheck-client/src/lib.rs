pub mod backend;
pub mod error;
pub mod memory;
pub mod poll;
pub mod rest;

pub use backend::{ListQuery, ModelBackend};
pub use error::{ClientError, Result};
pub use memory::{MemoryBackend, MemoryBackendConfig};
pub use poll::{
    wait_model_state, wait_operation, wait_until, PollError, PollOutcome, PollPolicy, StateTarget,
    Verdict,
};
pub use rest::{apply_auth, login, RestBackend, RestConfig};
