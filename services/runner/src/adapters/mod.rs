pub mod clock;
pub mod http_api;
pub mod rest_store;

pub use clock::SystemClock;
pub use http_api::HttpSessionApi;
pub use rest_store::FileRestStateStore;
