//! Client credentials, access token state, and the token manager that keeps it fresh.

pub mod credentials;
pub mod manager;
pub mod token;

pub use credentials::*;
pub use manager::*;
pub use token::{secret::*, *};
