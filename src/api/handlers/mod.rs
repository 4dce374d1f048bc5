//! HTTP request handlers organized by resource type

pub mod auth;
pub mod health;
pub mod users;

pub use auth::{
    change_password_handler, forgot_password_handler, login_handler, logout_handler, me_handler,
    register_handler, reset_password_handler,
};
pub use health::health_handler;
pub use users::{
    create_user_handler, delete_user_handler, get_user_handler, revoke_user_sessions_handler,
    update_user_role_handler,
};
