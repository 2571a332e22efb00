// Client library for the travel planning assistant backend

// Export modules for each layer
pub mod api;
pub mod store;
pub mod types;

// Re-export key types for convenience
pub use api::{ApiError, ClientConfig, ClientError, HttpTravelApi, TravelApi};
pub use store::{SearchStore, StoreState};
pub use types::{
    DayForecast, Flight, HealthCheckResponse, HistoryEntry, Recommendation, SearchRequest,
    SearchResponse, Weather,
};
