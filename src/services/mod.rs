/// OpenAPI documentation generation.
pub mod documentation;
/// Debounced persistence scheduling for plan documents.
pub mod flush_scheduler;
/// Health check service.
pub mod health_service;
/// Plan mutation engine and trip activation.
pub mod plan_service;
/// Trip room event construction and fan-out.
pub mod room_events;
/// Storage persistence coordinator.
pub mod storage_supervisor;
/// WebSocket connection gate and message handling service.
pub mod websocket_service;
