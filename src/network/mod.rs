pub mod client;
pub mod fetch;
pub mod session;

pub use client::SiteClient;
pub use fetch::{FetchRequest, FetchResponse, Fetcher, HttpService};
pub use session::Session;
