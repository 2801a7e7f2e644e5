//! Types shared between the bookstore API server and its clients.

pub mod api;
