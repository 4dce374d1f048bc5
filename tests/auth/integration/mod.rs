mod test_admin_users;
mod test_auth_middleware;
mod test_password_reset;
mod test_service_surface;
mod test_session_flow;
