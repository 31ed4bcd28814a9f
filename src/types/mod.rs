//! Wire and domain types shared by producers, consumers, and the task
//! state store.
//!
//! - [`envelope`] - the message envelope and the [`Record`] serialization
//!   contract every bus payload implements.
//! - [`records`] - the typed pipeline records carried on the bus
//!   ([`Objective`], [`Blueprint`]).
//! - [`task_state`] - the task lifecycle record ([`TaskState`]) and its
//!   closed status enum ([`TaskStatus`]).

pub mod envelope;
pub mod records;
pub mod task_state;

pub use envelope::{decode, encode, DecodeError, EncodeError, Envelope, Record};
pub use records::{Blueprint, Objective};
pub use task_state::{TaskState, TaskStatus};
