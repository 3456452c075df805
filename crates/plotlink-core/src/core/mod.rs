//! Link event plumbing

pub mod event;
