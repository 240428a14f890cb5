pub mod auth;
pub mod init;
pub mod notifications;
pub mod permissions;
pub mod realtime;
pub mod sharing;
pub mod sweeper;
