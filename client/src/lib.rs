//! Chat client state, shared by every front end.
//!
//! SYSTEM CONTEXT
//! ==============
//! The server pushes `hello`, `message` and `typing` frames over one event
//! stream and accepts typing pings over plain HTTP. This crate owns the local
//! projection of that stream: identity, the chat log, the set of peers shown
//! as typing, and the debounce controller that decides when to ping.
//!
//! Nothing here performs I/O or reads a clock. Callers feed decoded frames
//! and explicit instants, which keeps every timer rule testable.

pub mod state;
