pub mod db;
pub mod mailer;
pub mod pdf_store;

pub use db::DbAdapter;
pub use mailer::{LogMailer, MailerError, SmtpMailer};
pub use pdf_store::LocalPdfStorage;
