pub mod admin_service;
pub mod auth_service;
pub mod event_stream;
pub mod exam_service;
pub mod media_service;
pub mod note_service;
pub mod points_service;
