pub mod assignment;
pub mod common;
pub mod notification;
pub mod organization;
pub mod user;
pub mod workplace;
