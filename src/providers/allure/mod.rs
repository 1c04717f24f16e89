mod client;

pub use client::{AllureClient, AllureClientOptions};
