//! End-to-end tests: payload sidecars in, program output out
//!
//! Each topic compiles small programs through the runtime's compile entry
//! point, writes units to a temporary directory and runs them with stdout
//! captured.

mod harness;

mod async_await;
mod classes;
mod closures;
mod errors;
mod fundamentals;
mod modules;
mod runner;
