pub mod activity;
pub mod add;
pub mod context;
pub mod daily;
pub mod init;
pub mod queue;
pub mod review;
