//! HTTP API handlers for photoeval-ai

pub mod evaluate;
pub mod health;
pub mod images;
pub mod photos;

pub use evaluate::evaluate_routes;
pub use health::health_routes;
pub use images::image_routes;
pub use photos::photo_routes;
