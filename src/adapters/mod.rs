pub mod ftp_source;
pub mod log_file_source;
pub mod pdf_canvas;
pub mod smtp_mailer;
pub mod state_store;
