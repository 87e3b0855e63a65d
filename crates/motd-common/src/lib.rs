pub mod images;
pub mod retry;
pub mod wiki;
