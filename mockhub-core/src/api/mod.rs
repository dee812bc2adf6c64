pub mod hub_routes;

pub use hub_routes::{hub_router, ApiError, HubApiState, CLIENT_ID_HEADER};
