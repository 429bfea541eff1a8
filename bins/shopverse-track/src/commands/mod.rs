pub mod auth;
pub mod orders;
pub mod route;
pub mod track;
