pub mod audience;
pub mod notification;
pub mod password;
pub mod poll_results;
pub mod ticket;
