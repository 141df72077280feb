pub mod crud;
pub mod live;
pub mod zoom_oauth;
